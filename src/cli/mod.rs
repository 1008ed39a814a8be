use clap::{Parser, Subcommand};

use crate::utils::config::{ENV_ACCOUNT, ENV_REGION, ENV_ROLE};

#[derive(Parser)]
#[command(name = "saws")]
#[command(about = "Run commands across AWS accounts and regions under assumed-role credentials", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to saws-config.yaml (default: ~/.aws/saws-config.yaml, then ./saws-config.yaml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a command across accounts/regions concurrently
    Exec {
        /// Command line passed to the shell in every account/region
        #[arg(short = 'c', long)]
        command: String,

        /// IAM role name (or alias from the 'roles' map) to assume
        #[arg(short, long, env = ENV_ROLE)]
        role: String,

        /// Account names/wildcards, separated by commas or spaces
        #[arg(short, long, conflicts_with = "all", required_unless_present = "all")]
        selector: Option<String>,

        /// Process all accounts defined in config
        #[arg(short, long)]
        all: bool,

        /// Comma-separated regions (default: AWS config/env region, else eu-west-1)
        #[arg(long)]
        regions: Option<String>,

        /// Do not require the AWS CLI on PATH
        #[arg(long)]
        skip_tool_check: bool,
    },

    /// Start a sub-shell with assumed-role credentials for one account
    Shell {
        /// Account name or wildcard matching exactly one account
        #[arg(short, long, env = ENV_ACCOUNT)]
        selector: Option<String>,

        /// IAM role name (or alias) to assume
        #[arg(short, long, env = ENV_ROLE)]
        role: Option<String>,

        /// AWS region for the session
        #[arg(long, env = ENV_REGION)]
        region: Option<String>,
    },

    /// List accounts matched by a selector (all when omitted)
    Accounts {
        #[arg(short, long)]
        selector: Option<String>,
    },
}
