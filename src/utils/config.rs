use core::fmt;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use duration_string::DurationString;
use log::{debug, warn};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::SawsError;

pub const CONFIG_FILE_NAME: &str = "saws-config.yaml";
pub const AWS_CONFIG_DIR: &str = ".aws";

pub const ENV_ACCOUNT: &str = "SAWS_ACCOUNT";
pub const ENV_ROLE: &str = "SAWS_ROLE";
pub const ENV_REGION: &str = "SAWS_REGION";

pub const DEFAULT_SESSION_DURATION: Duration = Duration::from_secs(3600);
const MIN_SESSION_DURATION: Duration = Duration::from_secs(15 * 60);
const MAX_SESSION_DURATION: Duration = Duration::from_secs(12 * 3600);
const DEFAULT_SHELL: &str = "bash";

/// The target registry: accounts, regions and role aliases.
///
/// Loaded once at startup and shared read-only (behind an `Arc`) by the
/// selector, region resolver and executor.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct AppConfig {
    #[serde(default, deserialize_with = "account_ids")]
    pub accounts: BTreeMap<String, String>,
    #[serde(default)]
    pub common_regions: Vec<String>,
    #[serde(default)]
    pub roles: BTreeMap<String, String>,
    #[serde(default)]
    pub session_duration: Option<DurationString>,
    #[serde(default)]
    pub shell: Option<String>,
}

impl fmt::Display for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} accounts, {} regions, {} roles",
            self.accounts.len(),
            self.common_regions.len(),
            self.roles.len()
        )
    }
}

impl AppConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read SAWS config file '{}'", path.display()))?;
        let config = Self::from_yaml_str(&contents)
            .with_context(|| format!("invalid SAWS config file '{}'", path.display()))?;
        debug!("Loaded SAWS config: {} from {}", config, path.display());
        Ok(config)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let config: AppConfig =
            serde_yaml::from_str(contents).context("failed to parse YAML")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), SawsError> {
        if self.accounts.is_empty() {
            return Err(SawsError::Config(
                "'accounts' map cannot be empty".to_string(),
            ));
        }
        if let Some((name, _)) = self.accounts.iter().find(|(_, id)| id.trim().is_empty()) {
            return Err(SawsError::Config(format!(
                "account '{}' has an empty account id",
                name
            )));
        }
        let duration = self.session_duration();
        if !(MIN_SESSION_DURATION..=MAX_SESSION_DURATION).contains(&duration) {
            return Err(SawsError::Config(format!(
                "session_duration must be between 15m and 12h, got {}s",
                duration.as_secs()
            )));
        }
        if self.common_regions.is_empty() {
            debug!("'common_regions' list is empty in SAWS config");
        }
        if self.roles.is_empty() {
            debug!("'roles' map is empty; role names must be given verbatim");
        }
        Ok(())
    }

    pub fn account_id(&self, name: &str) -> Option<&str> {
        self.accounts.get(name).map(String::as_str)
    }

    /// Account names in lexicographic order.
    pub fn account_names(&self) -> impl Iterator<Item = &str> {
        self.accounts.keys().map(String::as_str)
    }

    /// Maps a friendly role alias to the real role name, or returns the input verbatim.
    pub fn resolve_role(&self, role: &str) -> String {
        match self.roles.get(role) {
            Some(actual) => {
                debug!("Interpreted role '{}' as alias for '{}'", role, actual);
                actual.clone()
            }
            None => role.to_string(),
        }
    }

    pub fn session_duration(&self) -> Duration {
        self.session_duration
            .clone()
            .map(Duration::from)
            .unwrap_or(DEFAULT_SESSION_DURATION)
    }

    pub fn shell(&self) -> &str {
        self.shell.as_deref().unwrap_or(DEFAULT_SHELL)
    }
}

/// Accepts account ids written as YAML strings or bare integers. Integers are
/// left-padded to the 12 digits of an AWS account id, since YAML drops leading zeros.
fn account_ids<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: BTreeMap<String, serde_yaml::Value> = BTreeMap::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(name, value)| match value {
            serde_yaml::Value::String(id) => Ok((name, id)),
            serde_yaml::Value::Number(n) => match n.as_u64() {
                Some(id) => Ok((name, format!("{:012}", id))),
                None => Err(D::Error::custom(format!(
                    "account '{}' has an invalid account id {}",
                    name, n
                ))),
            },
            serde_yaml::Value::Null => Ok((name, String::new())),
            other => Err(D::Error::custom(format!(
                "account '{}' id must be a string, got {:?}",
                name, other
            ))),
        })
        .collect()
}

/// Locates the config file: explicit override, then `~/.aws/saws-config.yaml`,
/// then `./saws-config.yaml`.
pub fn find_config_path(config_override: Option<&str>) -> Result<PathBuf, SawsError> {
    if let Some(raw) = config_override.filter(|s| !s.is_empty()) {
        let expanded = expand_home(raw);
        if expanded.exists() {
            debug!("Using specified SAWS config file: {}", expanded.display());
            return Ok(expanded);
        }
        return Err(SawsError::Config(format!(
            "specified SAWS config file '{}' (expanded to '{}') not found",
            raw,
            expanded.display()
        )));
    }

    match dirs::home_dir() {
        Some(home) => {
            let candidate = home.join(AWS_CONFIG_DIR).join(CONFIG_FILE_NAME);
            if candidate.exists() {
                return Ok(candidate);
            }
        }
        None => warn!(
            "Could not determine home directory, skipping ~/{}/{}",
            AWS_CONFIG_DIR, CONFIG_FILE_NAME
        ),
    }

    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return Ok(local);
    }

    Err(SawsError::Config(format!(
        "configuration file ('{name}') not found in standard locations (~/{dir}/{name}, ./{name}) and no --config flag provided",
        name = CONFIG_FILE_NAME,
        dir = AWS_CONFIG_DIR
    )))
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix('~') {
        match dirs::home_dir() {
            Some(home) => return home.join(rest.trim_start_matches('/')),
            None => warn!("Could not expand '~' in config path '{}'", raw),
        }
    }
    PathBuf::from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
accounts:
  prod: "111111111111"
  dev-a: "222222222222"
common_regions: [eu-west-1, us-east-1]
roles:
  admin: OrganizationAccountAccessRole
"#;

    #[test]
    fn test_parse_sample() {
        let config = AppConfig::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.account_id("prod"), Some("111111111111"));
        assert_eq!(config.account_names().collect::<Vec<_>>(), vec!["dev-a", "prod"]);
        assert_eq!(config.common_regions.len(), 2);
        assert_eq!(config.session_duration(), DEFAULT_SESSION_DURATION);
        assert_eq!(config.shell(), "bash");
    }

    #[test]
    fn test_empty_accounts_rejected() {
        let err = AppConfig::from_yaml_str("common_regions: [eu-west-1]\n").unwrap_err();
        assert!(format!("{:#}", err).contains("'accounts' map cannot be empty"));
    }

    #[test]
    fn test_numeric_account_ids_padded() {
        let config =
            AppConfig::from_yaml_str("accounts:\n  legacy: 012345678901\n  plain: 210987654321\n")
                .unwrap();
        assert_eq!(config.account_id("legacy"), Some("012345678901"));
        assert_eq!(config.account_id("plain"), Some("210987654321"));
    }

    #[test]
    fn test_empty_account_id_rejected() {
        let err = AppConfig::from_yaml_str("accounts:\n  prod: \"\"\n").unwrap_err();
        assert!(format!("{:#}", err).contains("empty account id"));
    }

    #[test]
    fn test_session_duration_parsed() {
        let config =
            AppConfig::from_yaml_str("accounts:\n  a: \"1\"\nsession_duration: 45m\n").unwrap();
        assert_eq!(config.session_duration(), Duration::from_secs(45 * 60));
    }

    #[test]
    fn test_session_duration_out_of_range() {
        let result = AppConfig::from_yaml_str("accounts:\n  a: \"1\"\nsession_duration: 1m\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_role_alias_and_verbatim() {
        let config = AppConfig::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.resolve_role("admin"), "OrganizationAccountAccessRole");
        assert_eq!(config.resolve_role("ReadOnly"), "ReadOnly");
    }

    #[test]
    fn test_from_file_and_override_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let path = file.path().to_string_lossy().to_string();

        let found = find_config_path(Some(path.as_str())).unwrap();
        let config = AppConfig::from_file(found).unwrap();
        assert_eq!(config.accounts.len(), 2);
    }

    #[test]
    fn test_missing_override_path() {
        let result = find_config_path(Some("/nonexistent/saws-config.yaml"));
        assert!(matches!(result, Err(SawsError::Config(_))));
    }
}
