use anyhow::Result;
use async_trait::async_trait;
use serial_test::serial;
use std::collections::HashSet;
use std::ffi::OsString;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use saws::controller::{AccountTarget, CommandRequest, Controller};
use saws::error::{SawsError, SawsResult};
use saws::execution::report::NullSink;
use saws::execution::{ShellRunner, UnitFailure};
use saws::modules::aws::{AssumeRoleRequest, CredentialBundle, RoleImpersonator};
use saws::utils::config::{find_config_path, AppConfig};
use saws::utils::RegionProbe;
use tokio_util::sync::CancellationToken;

const CONFIG: &str = r#"
accounts:
  dev-a: "111111111111"
  dev-b: "222222222222"
  prod-a: "333333333333"
roles:
  ro: ReadOnlyAccess
shell: sh
"#;

/// Issues unique keys per call and refuses one account.
struct FakeSts {
    deny_account: Option<&'static str>,
    calls: AtomicUsize,
}

#[async_trait]
impl RoleImpersonator for FakeSts {
    async fn assume(&self, request: &AssumeRoleRequest) -> SawsResult<CredentialBundle> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.deny_account == Some(request.account_id.as_str()) {
            return Err(SawsError::Impersonation {
                role_arn: request.role_arn(),
                source: "AccessDenied: not authorized to perform sts:AssumeRole".into(),
            });
        }
        Ok(CredentialBundle {
            access_key_id: format!("ASIA{}N{}", request.account_id, n),
            secret_access_key: format!("secret-{}", n),
            session_token: format!("token-{}", n),
            expiration: None,
        })
    }
}

struct NoProbe;

#[async_trait]
impl RegionProbe for NoProbe {
    async fn default_region(&self) -> Option<String> {
        None
    }
}

/// Sets process variables for one test and restores the previous values on drop,
/// including when the test bails out early.
struct EnvGuard {
    saved: Vec<(&'static str, Option<OsString>)>,
}

impl EnvGuard {
    fn set(vars: &[(&'static str, &str)]) -> Self {
        let saved = vars
            .iter()
            .map(|(name, value)| {
                let previous = std::env::var_os(name);
                std::env::set_var(name, value);
                (*name, previous)
            })
            .collect();
        Self { saved }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (name, previous) in self.saved.drain(..).rev() {
            match previous {
                Some(value) => std::env::set_var(name, value),
                None => std::env::remove_var(name),
            }
        }
    }
}

fn load_config() -> Result<AppConfig> {
    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(CONFIG.as_bytes())?;
    let raw_path = file.path().to_string_lossy().to_string();
    let path = find_config_path(Some(raw_path.as_str()))?;
    AppConfig::from_file(path)
}

fn controller(deny_account: Option<&'static str>) -> Result<Controller> {
    let config = load_config()?;
    let runner = Arc::new(ShellRunner::new(config.shell()));
    Ok(Controller::new(
        Arc::new(config),
        Arc::new(FakeSts {
            deny_account,
            calls: AtomicUsize::new(0),
        }),
        runner,
        Arc::new(NoProbe),
        CancellationToken::new(),
    ))
}

fn request(command: &str, target: AccountTarget, regions: &str) -> CommandRequest {
    CommandRequest {
        command: command.to_string(),
        role: "ro".to_string(),
        target,
        regions: Some(regions.to_string()),
    }
}

#[tokio::test]
#[serial]
async fn test_subprocess_sees_only_unit_credentials() -> Result<()> {
    let _env = EnvGuard::set(&[
        ("AWS_ACCESS_KEY_ID", "AKIAPARENT"),
        ("AWS_SECURITY_TOKEN", "parent-security-token"),
        ("AWS_PROFILE", "parent-profile"),
    ]);

    let report = controller(None)?
        .run_command(
            &request(
                "echo \"$AWS_ACCESS_KEY_ID|$AWS_REGION|$AWS_DEFAULT_REGION|${AWS_PROFILE:-none}|${AWS_SECURITY_TOKEN:-none}\"",
                AccountTarget::All,
                "eu-west-1,us-east-1",
            ),
            Arc::new(NullSink),
        )
        .await?;

    assert_eq!(report.total(), 6);
    assert_eq!(report.success_count, 6);

    let mut keys = HashSet::new();
    for result in &report.results {
        let fields: Vec<&str> = result.stdout.trim().split('|').collect();
        assert_eq!(fields.len(), 5, "unexpected output: {}", result.stdout);
        assert!(fields[0].starts_with("ASIA"));
        assert_eq!(fields[1], result.region);
        assert_eq!(fields[2], result.region);
        assert_eq!(fields[3], "none");
        assert_eq!(fields[4], "none");
        keys.insert(fields[0].to_string());
    }
    assert_eq!(keys.len(), 6, "every unit must receive its own credentials");
    Ok(())
}

#[tokio::test]
#[serial]
async fn test_one_denied_account_does_not_block_others() -> Result<()> {
    let report = controller(Some("222222222222"))?
        .run_command(
            &request("exit 0", AccountTarget::Selector("dev-* prod-a".to_string()), "eu-west-1"),
            Arc::new(NullSink),
        )
        .await?;

    assert_eq!(report.total(), 3);
    assert_eq!(report.success_count, 2);
    let denied = report
        .results
        .iter()
        .find(|r| r.account_name == "dev-b")
        .expect("dev-b result present");
    assert!(matches!(denied.failure, Some(UnitFailure::Impersonation(_))));

    let verdict = report.verdict();
    assert_eq!(verdict.exit_code, 1);
    assert!(verdict.message.contains("2 out of 3"));
    Ok(())
}

#[tokio::test]
#[serial]
async fn test_exit_codes_and_streams_are_captured() -> Result<()> {
    let report = controller(None)?
        .run_command(
            &request(
                "echo out; echo warn 1>&2; [ \"$AWS_REGION\" = us-east-1 ] && exit 4; exit 0",
                AccountTarget::Selector("prod-a".to_string()),
                "eu-west-1, us-east-1",
            ),
            Arc::new(NullSink),
        )
        .await?;

    assert_eq!(report.total(), 2);
    let eu = &report.results[0];
    let us = &report.results[1];
    assert_eq!((eu.region.as_str(), eu.exit_code), ("eu-west-1", 0));
    assert_eq!((us.region.as_str(), us.exit_code), ("us-east-1", 4));
    assert_eq!(eu.stdout.trim(), "out");
    assert_eq!(us.stderr.trim(), "warn");
    assert_eq!(report.success_count, 1);
    Ok(())
}

#[test]
#[serial]
fn test_env_guard_restores_on_early_exit() {
    std::env::remove_var("SAWS_GUARD_CHECK");
    std::env::set_var("SAWS_GUARD_PREVIOUS", "before");

    let bail_early = || -> Result<()> {
        let _env = EnvGuard::set(&[
            ("SAWS_GUARD_CHECK", "during"),
            ("SAWS_GUARD_PREVIOUS", "during"),
        ]);
        anyhow::bail!("run_command failed")
    };
    assert!(bail_early().is_err());

    assert!(std::env::var_os("SAWS_GUARD_CHECK").is_none());
    assert_eq!(std::env::var("SAWS_GUARD_PREVIOUS").as_deref(), Ok("before"));
    std::env::remove_var("SAWS_GUARD_PREVIOUS");
}

#[tokio::test]
#[serial]
async fn test_missing_shell_records_sentinel() -> Result<()> {
    let config = load_config()?;
    let controller = Controller::new(
        Arc::new(config),
        Arc::new(FakeSts {
            deny_account: None,
            calls: AtomicUsize::new(0),
        }),
        Arc::new(ShellRunner::new("/nonexistent/shell")),
        Arc::new(NoProbe),
        CancellationToken::new(),
    );
    let report = controller
        .run_command(
            &request("true", AccountTarget::Selector("dev-a".to_string()), "eu-west-1"),
            Arc::new(NullSink),
        )
        .await?;

    assert_eq!(report.total(), 1);
    assert_eq!(report.results[0].exit_code, -1);
    assert!(matches!(report.results[0].failure, Some(UnitFailure::Spawn(_))));
    assert_eq!(report.verdict().exit_code, 1);
    Ok(())
}
