pub mod shell;

use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::error::SawsResult;
use crate::execution::env::process_environment;
use crate::execution::{cross_product, ExecutionReport, ExecutionUnit, Executor, ResultSink};
use crate::execution::CommandRunner;
use crate::modules::aws::RoleImpersonator;
use crate::utils::{region, selector, AppConfig, RegionProbe};

pub use shell::{ShellRequest, ShellSession};

/// Which accounts a run targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountTarget {
    All,
    Selector(String),
}

#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub command: String,
    pub role: String,
    pub target: AccountTarget,
    pub regions: Option<String>,
}

/// Wires the registry, impersonator, runner and region probe together.
///
/// All selection happens synchronously before any unit is spawned, so the
/// planned unit set is fixed for the whole run.
#[derive(Clone)]
pub struct Controller {
    config: Arc<AppConfig>,
    impersonator: Arc<dyn RoleImpersonator>,
    runner: Arc<dyn CommandRunner>,
    probe: Arc<dyn RegionProbe>,
    cancel: CancellationToken,
}

impl Controller {
    pub fn new(
        config: Arc<AppConfig>,
        impersonator: Arc<dyn RoleImpersonator>,
        runner: Arc<dyn CommandRunner>,
        probe: Arc<dyn RegionProbe>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            impersonator,
            runner,
            probe,
            cancel,
        }
    }

    pub fn resolve_accounts(&self, target: &AccountTarget) -> SawsResult<Vec<String>> {
        resolve_target(&self.config, target)
    }

    #[instrument(skip(self, request), fields(role = %request.role))]
    pub async fn plan(&self, request: &CommandRequest) -> Result<Vec<ExecutionUnit>> {
        let role = request.role.trim();
        if role.is_empty() {
            return Err(anyhow!("a role is required for command execution"));
        }
        let role = self.config.resolve_role(role);

        let accounts = self.resolve_accounts(&request.target)?;
        let regions = region::resolve(request.regions.as_deref(), self.probe.as_ref()).await?;

        let units = cross_product(&accounts, &regions, &role, &request.command);
        info!(
            "Planning {} executions ({} accounts x {} regions)",
            units.len(),
            accounts.len(),
            regions.len()
        );
        Ok(units)
    }

    #[instrument(skip(self, request, sink))]
    pub async fn run_command(
        &self,
        request: &CommandRequest,
        sink: Arc<dyn ResultSink>,
    ) -> Result<ExecutionReport> {
        let units = self.plan(request).await.context("failed to plan command execution")?;

        let executor = Executor::new(
            self.config.clone(),
            self.impersonator.clone(),
            self.runner.clone(),
            sink,
            process_environment(),
            self.cancel.clone(),
        );
        let report = executor.run(units).await;

        info!(
            "Finished {} executions in {:?}, {} succeeded",
            report.total(),
            report.elapsed,
            report.success_count
        );
        Ok(report)
    }
}

fn resolve_target(config: &AppConfig, target: &AccountTarget) -> SawsResult<Vec<String>> {
    match target {
        AccountTarget::All => Ok(selector::resolve_all(config)),
        AccountTarget::Selector(expr) => selector::resolve(expr, config),
    }
}

/// `(name, account id)` pairs for the given selector, or every account.
/// Works on the registry alone; no AWS client is involved.
pub fn list_accounts(config: &AppConfig, selector: Option<&str>) -> Result<Vec<(String, String)>> {
    let target = match selector {
        Some(expr) => AccountTarget::Selector(expr.to_string()),
        None => AccountTarget::All,
    };
    let names = resolve_target(config, &target)?;
    Ok(names
        .into_iter()
        .filter_map(|name| {
            let id = config.account_id(&name)?.to_string();
            Some((name, id))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SawsError;
    use crate::execution::report::NullSink;
    use crate::execution::{CommandOutput, Environment, RunError};
    use crate::modules::aws::{AssumeRoleRequest, CredentialBundle};
    use async_trait::async_trait;
    use std::time::Duration;

    struct StaticImpersonator;

    #[async_trait]
    impl RoleImpersonator for StaticImpersonator {
        async fn assume(&self, request: &AssumeRoleRequest) -> SawsResult<CredentialBundle> {
            Ok(CredentialBundle {
                access_key_id: format!("ASIA{}", request.account_id),
                secret_access_key: "s".to_string(),
                session_token: "t".to_string(),
                expiration: None,
            })
        }
    }

    struct OkRunner;

    #[async_trait]
    impl CommandRunner for OkRunner {
        async fn run(
            &self,
            command: &str,
            _env: &Environment,
            _cancel: &CancellationToken,
        ) -> Result<CommandOutput, RunError> {
            Ok(CommandOutput {
                exit_code: 0,
                stdout: command.to_string(),
                stderr: String::new(),
                duration: Duration::ZERO,
            })
        }
    }

    struct NoRegion;

    #[async_trait]
    impl RegionProbe for NoRegion {
        async fn default_region(&self) -> Option<String> {
            None
        }
    }

    fn registry() -> AppConfig {
        AppConfig::from_yaml_str(
            "accounts:\n  dev-a: \"1\"\n  dev-b: \"2\"\n  prod-a: \"3\"\nroles:\n  ro: ReadOnlyAccess\n",
        )
        .unwrap()
    }

    fn controller() -> Controller {
        Controller::new(
            Arc::new(registry()),
            Arc::new(StaticImpersonator),
            Arc::new(OkRunner),
            Arc::new(NoRegion),
            CancellationToken::new(),
        )
    }

    fn request(target: AccountTarget, regions: Option<&str>) -> CommandRequest {
        CommandRequest {
            command: "aws sts get-caller-identity".to_string(),
            role: "ro".to_string(),
            target,
            regions: regions.map(String::from),
        }
    }

    #[tokio::test]
    async fn test_plan_cross_product_with_alias() {
        let units = controller()
            .plan(&request(
                AccountTarget::Selector("dev-*".to_string()),
                Some("eu-west-1,us-east-1"),
            ))
            .await
            .unwrap();
        assert_eq!(units.len(), 4);
        assert!(units.iter().all(|u| u.role_name == "ReadOnlyAccess"));
    }

    #[tokio::test]
    async fn test_plan_all_accounts_fallback_region() {
        let units = controller()
            .plan(&request(AccountTarget::All, None))
            .await
            .unwrap();
        assert_eq!(units.len(), 3);
        assert!(units.iter().all(|u| u.region == region::FALLBACK_REGION));
    }

    #[tokio::test]
    async fn test_plan_no_match_is_fatal() {
        let err = controller()
            .plan(&request(AccountTarget::Selector("staging".to_string()), None))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SawsError>(),
            Some(SawsError::NoMatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_plan_invalid_regions_is_fatal() {
        let err = controller()
            .plan(&request(AccountTarget::All, Some(",,")))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SawsError>(),
            Some(SawsError::NoValidRegion { .. })
        ));
    }

    #[tokio::test]
    async fn test_run_command_reports_all_units() {
        let report = controller()
            .run_command(
                &request(AccountTarget::All, Some("eu-west-1,us-east-1")),
                Arc::new(NullSink),
            )
            .await
            .unwrap();
        assert_eq!(report.total(), 6);
        assert!(report.verdict().is_success());
    }

    #[test]
    fn test_list_accounts() {
        let config = registry();
        let listed = list_accounts(&config, Some("prod-*")).unwrap();
        assert_eq!(listed, vec![("prod-a".to_string(), "3".to_string())]);
        assert_eq!(list_accounts(&config, None).unwrap().len(), 3);
        assert!(list_accounts(&config, Some("staging")).is_err());
    }
}
