use std::fmt::Write as _;
use std::io::Write;
use std::time::Duration;

use super::unit::ExecutionResult;

/// Receives each result as soon as its unit finishes.
pub trait ResultSink: Send + Sync {
    fn record(&self, result: &ExecutionResult);
}

/// Prints each result block to stdout with a single write under the stdout lock,
/// so blocks never interleave internally.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl ResultSink for StdoutSink {
    fn record(&self, result: &ExecutionResult) {
        let block = render_block(result);
        let mut out = std::io::stdout().lock();
        if let Err(e) = out.write_all(block.as_bytes()).and_then(|_| out.flush()) {
            log::error!("Failed to write result block: {}", e);
        }
    }
}

/// Discards results; used when only the returned collection matters.
#[derive(Debug, Default)]
pub struct NullSink;

impl ResultSink for NullSink {
    fn record(&self, _result: &ExecutionResult) {}
}

pub fn render_block(result: &ExecutionResult) -> String {
    let mut block = String::new();
    let _ = writeln!(
        block,
        "--- Result (Account: {}, Region: {}, Status: {}, Exit Code: {}, Duration: {:?}) ---",
        result.account_name,
        result.region,
        result.status,
        result.exit_code,
        round_millis(result.duration)
    );

    if let Some(failure) = &result.failure {
        let _ = writeln!(block, "[ERROR]\n{}", failure);
    }

    let stdout = result.stdout.trim();
    if !stdout.is_empty() {
        let _ = writeln!(block, "[STDOUT]\n{}", stdout);
    }

    let stderr = result.stderr.trim();
    if !stderr.is_empty() {
        let label = if result.exit_code == 0 {
            "[STDERR (Exit Code 0)]"
        } else {
            "[STDERR]"
        };
        let _ = writeln!(block, "{}\n{}", label, stderr);
    }

    block.push_str("--- End Result ---\n");
    block
}

fn round_millis(duration: Duration) -> Duration {
    Duration::from_millis(duration.as_millis().min(u64::MAX as u128) as u64)
}

/// Final process outcome for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub exit_code: i32,
    pub message: String,
}

impl Verdict {
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

pub fn final_verdict(total: usize, success_count: usize) -> Verdict {
    if success_count == total {
        Verdict {
            exit_code: 0,
            message: format!("All {} executions completed successfully.", total),
        }
    } else {
        Verdict {
            exit_code: 1,
            message: format!(
                "{} out of {} targeted executions completed successfully. {} failed. See the per-unit results above for details.",
                success_count,
                total,
                total.saturating_sub(success_count)
            ),
        }
    }
}
