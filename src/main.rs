use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use saws::cli::{Cli, Commands};
use saws::controller::{
    list_accounts, shell, AccountTarget, CommandRequest, Controller, ShellRequest,
};
use saws::error::SawsError;
use saws::execution::{ShellRunner, StdoutSink};
use saws::modules::aws::utils::aws_sts_client;
use saws::telemetry;
use saws::utils::config::{find_config_path, AppConfig};
use saws::utils::ProfileRegionProbe;

const REQUIRED_TOOL: &str = "aws";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if let Err(e) = telemetry::init_telemetry(cli.verbose) {
        eprintln!("Failed to initialize telemetry: {}", e);
    }

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32> {
    let config_path = find_config_path(cli.config.as_deref())?;
    let config = Arc::new(AppConfig::from_file(&config_path)?);

    match cli.command {
        Commands::Exec {
            command,
            role,
            selector,
            all,
            regions,
            skip_tool_check,
        } => {
            if !skip_tool_check {
                which::which(REQUIRED_TOOL).map_err(|_| SawsError::ToolMissing {
                    tool: REQUIRED_TOOL.to_string(),
                })?;
            }
            let target = match (all, selector) {
                (true, _) => AccountTarget::All,
                (false, Some(expr)) => AccountTarget::Selector(expr),
                (false, None) => anyhow::bail!("must use -a or -s with exec"),
            };
            let controller = build_controller(config).await;
            exec_command(
                &controller,
                CommandRequest {
                    command,
                    role,
                    target,
                    regions,
                },
            )
            .await
        }
        Commands::Shell {
            selector,
            role,
            region,
        } => {
            let controller = build_controller(config).await;
            let session = controller
                .establish_session(&ShellRequest {
                    selector,
                    role,
                    region,
                })
                .await
                .context("failed to establish AWS context for sub-shell")?;
            shell::run_shell(&session).await
        }
        Commands::Accounts { selector } => {
            for (name, id) in list_accounts(&config, selector.as_deref())? {
                println!("{} ({})", name, id);
            }
            Ok(0)
        }
    }
}

/// Wires the AWS-backed controller and hooks Ctrl-C to its cancellation token.
async fn build_controller(config: Arc<AppConfig>) -> Controller {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling in-flight executions");
            on_interrupt.cancel();
        }
    });

    let runner = Arc::new(ShellRunner::new(config.shell()));
    Controller::new(
        config,
        Arc::new(aws_sts_client().await),
        runner,
        Arc::new(ProfileRegionProbe::default()),
        cancel,
    )
}

async fn exec_command(controller: &Controller, request: CommandRequest) -> Result<i32> {
    let report = controller
        .run_command(&request, Arc::new(StdoutSink))
        .await?;

    let verdict = report.verdict();
    if verdict.is_success() {
        info!("{}", verdict.message);
    } else {
        eprintln!("{}", verdict.message);
    }
    Ok(verdict.exit_code)
}
