use anyhow::Result;
use std::fs::OpenOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global subscriber. `log` records are bridged into it, so engine
/// modules using the `log` macros and the controller using `tracing` share one sink.
///
/// Output never goes to stdout: result blocks own that stream.
pub fn init_telemetry(verbose: bool) -> Result<()> {
    let exporter_type = std::env::var("SAWS_LOG_EXPORTER").unwrap_or_else(|_| "stderr".to_string());

    match exporter_type.as_str() {
        "file" => init_file(verbose)?,
        "stderr" => init_stderr(verbose)?,
        _ => {
            eprintln!("Unknown SAWS_LOG_EXPORTER: {}, falling back to stderr", exporter_type);
            init_stderr(verbose)?;
        }
    }

    Ok(())
}

fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "debug" } else { "warn" })
    })
}

fn init_stderr(verbose: bool) -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose),
        )
        .with(env_filter(verbose))
        .try_init()?;

    Ok(())
}

fn init_file(verbose: bool) -> Result<()> {
    let log_file_path = std::env::var("SAWS_LOG_FILE")
        .unwrap_or_else(|_| "saws.log".to_string());

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file_path)?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::sync::Arc::new(log_file))
                .with_ansi(false)
        )
        .with(env_filter(verbose))
        .try_init()?;

    eprintln!("Logging to file: {}", log_file_path);

    Ok(())
}
