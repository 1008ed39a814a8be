use std::ffi::OsString;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error};
use tokio_util::sync::CancellationToken;

use super::env::isolated_environment;
use super::report::{final_verdict, ResultSink, Verdict};
use super::runner::{CommandRunner, RunError};
use super::unit::{ExecutionResult, ExecutionUnit, UnitFailure};
use crate::modules::aws::{AssumeRoleRequest, RoleImpersonator};
use crate::utils::AppConfig;

pub const COMMAND_SESSION_TAG: &str = "CmdExecSess";

/// Outcome of a whole fan-out run, sorted by (account, region).
#[derive(Debug)]
pub struct ExecutionReport {
    pub results: Vec<ExecutionResult>,
    pub success_count: usize,
    pub elapsed: Duration,
}

impl ExecutionReport {
    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn verdict(&self) -> Verdict {
        final_verdict(self.total(), self.success_count)
    }
}

struct Worker {
    config: Arc<AppConfig>,
    impersonator: Arc<dyn RoleImpersonator>,
    runner: Arc<dyn CommandRunner>,
    sink: Arc<dyn ResultSink>,
    base_env: Arc<Vec<(OsString, OsString)>>,
    cancel: CancellationToken,
    successes: AtomicUsize,
}

/// Runs one task per execution unit, all at once, and joins them all.
///
/// A unit's failure never affects its siblings; the only shared mutable state
/// is the success counter and the sink.
pub struct Executor {
    worker: Arc<Worker>,
}

impl Executor {
    pub fn new(
        config: Arc<AppConfig>,
        impersonator: Arc<dyn RoleImpersonator>,
        runner: Arc<dyn CommandRunner>,
        sink: Arc<dyn ResultSink>,
        base_env: Vec<(OsString, OsString)>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            worker: Arc::new(Worker {
                config,
                impersonator,
                runner,
                sink,
                base_env: Arc::new(base_env),
                cancel,
                successes: AtomicUsize::new(0),
            }),
        }
    }

    pub async fn run(&self, units: Vec<ExecutionUnit>) -> ExecutionReport {
        let started = Instant::now();
        let baseline = self.worker.successes.load(Ordering::SeqCst);
        debug!("Spawning {} execution units", units.len());

        let handles: Vec<_> = units
            .into_iter()
            .map(|unit| {
                let worker = self.worker.clone();
                let task_unit = unit.clone();
                let handle = tokio::spawn(async move { worker.process(task_unit).await });
                (unit, handle)
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (unit, handle) in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    error!(
                        "Worker for Account: {}, Region: {} aborted: {}",
                        unit.account_name, unit.region, e
                    );
                    let result = ExecutionResult::failed(
                        &unit,
                        UnitFailure::Spawn(format!("worker aborted: {}", e)),
                        Duration::ZERO,
                    );
                    self.worker.sink.record(&result);
                    results.push(result);
                }
            }
        }

        results.sort_by(|a, b| a.key().cmp(&b.key()));
        let success_count = self.worker.successes.load(Ordering::SeqCst) - baseline;
        let elapsed = started.elapsed();
        debug!("Finished {} executions in {:?}", results.len(), elapsed);

        ExecutionReport {
            results,
            success_count,
            elapsed,
        }
    }
}

impl Worker {
    async fn process(&self, unit: ExecutionUnit) -> ExecutionResult {
        let result = self.execute(&unit).await;
        if result.is_success() {
            self.successes.fetch_add(1, Ordering::SeqCst);
        }
        self.sink.record(&result);
        result
    }

    async fn execute(&self, unit: &ExecutionUnit) -> ExecutionResult {
        let started = Instant::now();

        let Some(account_id) = self.config.account_id(&unit.account_name) else {
            error!(
                "Account ID not found for SAWS config account name '{}'",
                unit.account_name
            );
            return ExecutionResult::failed(unit, UnitFailure::UnknownAccount, started.elapsed());
        };

        let request = AssumeRoleRequest::new(
            account_id,
            unit.role_name.as_str(),
            COMMAND_SESSION_TAG,
            self.config.session_duration(),
        );

        let assumed = tokio::select! {
            assumed = self.impersonator.assume(&request) => assumed,
            _ = self.cancel.cancelled() => {
                return ExecutionResult::failed(unit, UnitFailure::Cancelled, started.elapsed());
            }
        };

        let credentials = match assumed {
            Ok(credentials) => credentials,
            Err(e) => {
                error!(
                    "Assume Role Failed Account:{} Region:{} Role:{}: {}",
                    unit.account_name, unit.region, unit.role_name, e
                );
                return ExecutionResult::failed(
                    unit,
                    UnitFailure::Impersonation(e.to_string()),
                    started.elapsed(),
                );
            }
        };

        let env = isolated_environment(
            self.base_env.iter().map(|(k, v)| (k.as_os_str(), v.as_os_str())),
            &credentials,
            &unit.region,
        );

        match self.runner.run(&unit.command, &env, &self.cancel).await {
            Ok(output) => ExecutionResult::from_exit(
                unit,
                output.exit_code,
                output.duration,
                output.stdout,
                output.stderr,
            ),
            Err(RunError::Cancelled(elapsed)) => {
                ExecutionResult::failed(unit, UnitFailure::Cancelled, elapsed)
            }
            Err(e) => {
                error!(
                    "ERROR executing command '{}' for Account: {}, Region: {}: {}",
                    unit.command, unit.account_name, unit.region, e
                );
                ExecutionResult::failed(unit, UnitFailure::Spawn(e.to_string()), started.elapsed())
            }
        }
    }
}
