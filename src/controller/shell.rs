//! Single-target sub-shell: assume one role once, then hand the terminal to
//! an interactive shell carrying only that session's credentials.

use std::ffi::OsString;
use std::process::Stdio;

use anyhow::{anyhow, bail, Context, Result};
use tokio::process::Command;
use tracing::{debug, info, instrument};

use super::{AccountTarget, Controller};
use crate::execution::env::{isolated_environment, process_environment, Environment};
use crate::execution::runner::exit_code;
use crate::modules::aws::{AssumeRoleRequest, CredentialBundle};
use crate::utils::config::{ENV_ACCOUNT, ENV_ROLE};
use crate::utils::region;

pub const SHELL_SESSION_TAG: &str = "InteractiveSubShell";
const INFO_PREFIX: &str = "SAWS_INFO_";

#[derive(Debug, Clone, Default)]
pub struct ShellRequest {
    pub selector: Option<String>,
    pub role: Option<String>,
    pub region: Option<String>,
}

/// The context and credentials established for one sub-shell.
#[derive(Debug, Clone)]
pub struct ShellSession {
    pub account_name: String,
    pub account_id: String,
    pub role_name: String,
    pub region: String,
    pub credentials: CredentialBundle,
}

impl ShellSession {
    /// Isolated credential environment plus `SAWS_INFO_*` prompt hints;
    /// stale `SAWS_INFO_*` values from an enclosing session are dropped.
    pub fn environment<I, K, V>(&self, base: I) -> Environment
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
        V: Into<OsString>,
    {
        let base = base
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(k, _): &(OsString, OsString)| {
                !k.to_string_lossy().starts_with(INFO_PREFIX)
            });
        let mut env = isolated_environment(base, &self.credentials, &self.region);

        env.insert("SAWS_INFO_ACCOUNT_NAME".into(), self.account_name.clone().into());
        env.insert("SAWS_INFO_ACCOUNT_ID".into(), self.account_id.clone().into());
        env.insert("SAWS_INFO_ROLE_NAME".into(), self.role_name.clone().into());
        env.insert("SAWS_INFO_REGION".into(), self.region.clone().into());
        env
    }
}

impl Controller {
    /// Resolves exactly one account, the role and the region, then assumes the role.
    #[instrument(skip(self, request))]
    pub async fn establish_session(&self, request: &ShellRequest) -> Result<ShellSession> {
        let selector = request
            .selector
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| anyhow!("no account selector given; pass -s or set {}", ENV_ACCOUNT))?;
        let role = request
            .role
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("no role given; pass -r or set {}", ENV_ROLE))?;

        let matches = self.resolve_accounts(&AccountTarget::Selector(selector.to_string()))?;
        let account_name = match matches.as_slice() {
            [single] => single.clone(),
            many => bail!(
                "selector '{}' matched {} accounts ({}); a sub-shell needs exactly one",
                selector,
                many.len(),
                many.join(", ")
            ),
        };
        let account_id = self
            .config
            .account_id(&account_name)
            .ok_or_else(|| anyhow!("account id not found for '{}'", account_name))?
            .to_string();
        let role_name = self.config.resolve_role(role);
        let region = region::resolve_single(request.region.as_deref(), self.probe.as_ref()).await;

        info!(
            "Context established: Account={}({}), Role={}, Region={}",
            account_name, account_id, role_name, region
        );

        let assume_request = AssumeRoleRequest::new(
            account_id.as_str(),
            role_name.as_str(),
            SHELL_SESSION_TAG,
            self.config.session_duration(),
        );
        let credentials = tokio::select! {
            assumed = self.impersonator.assume(&assume_request) => assumed.with_context(|| {
                format!(
                    "failed to assume role '{}' in account {} ({}) for region {}",
                    role_name, account_name, account_id, region
                )
            })?,
            _ = self.cancel.cancelled() => bail!("cancelled while assuming role"),
        };

        Ok(ShellSession {
            account_name,
            account_id,
            role_name,
            region,
            credentials,
        })
    }
}

/// Runs an interactive shell for `session` and returns its exit code
/// (-1 when the shell was killed by a signal).
pub async fn run_shell(session: &ShellSession) -> Result<i32> {
    let shell = std::env::var("SHELL")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| {
            debug!("SHELL environment variable not set, defaulting to bash");
            "bash".to_string()
        });
    let env = session.environment(process_environment());

    eprintln!(
        "AWS context configured for: Account={}({}), Role={}, Region={}",
        session.account_name, session.account_id, session.role_name, session.region
    );
    if let Some(expiration) = session.credentials.expiration {
        eprintln!(
            "Session expires around: {}",
            expiration.with_timezone(&chrono::Local).to_rfc2822()
        );
    }
    eprintln!("Type 'exit' or press Ctrl+D to end this session.");

    let status = Command::new(&shell)
        .env_clear()
        .envs(&env)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .with_context(|| format!("failed to run interactive sub-shell '{}'", shell))?;

    debug!("Interactive sub-shell session ended with {}", status);
    Ok(exit_code(status))
}
