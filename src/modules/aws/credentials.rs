use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Temporary credentials returned by one role assumption.
///
/// Each execution unit owns its own bundle; bundles are never shared.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialBundle {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: Option<DateTime<Utc>>,
}

impl fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &"** redacted **")
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// Parameters of a single role assumption.
#[derive(Debug, Clone)]
pub struct AssumeRoleRequest {
    pub account_id: String,
    pub role_name: String,
    pub session_tag: String,
    pub duration: Duration,
}

impl AssumeRoleRequest {
    pub fn new(
        account_id: impl Into<String>,
        role_name: impl Into<String>,
        session_tag: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            role_name: role_name.into(),
            session_tag: session_tag.into(),
            duration,
        }
    }

    pub fn role_arn(&self) -> String {
        role_arn(&self.account_id, &self.role_name)
    }

    pub fn session_name(&self) -> String {
        session_name(&self.session_tag, &self.role_name, std::process::id())
    }
}

const MAX_SESSION_NAME_LEN: usize = 64;
const MAX_ROLE_PART_LEN: usize = 30;

pub fn role_arn(account_id: &str, role_name: &str) -> String {
    format!("arn:aws:iam::{}:role/{}", account_id, role_name)
}

/// Builds `<tag>-<role>-<pid>`, with path separators and spaces in the role
/// replaced and the whole name capped at the STS limit of 64 characters.
pub fn session_name(tag: &str, role_name: &str, pid: u32) -> String {
    let role_part: String = role_name
        .replace('/', "-")
        .replace(' ', "_")
        .chars()
        .take(MAX_ROLE_PART_LEN)
        .collect();
    format!("{}-{}-{}", tag, role_part, pid)
        .chars()
        .take(MAX_SESSION_NAME_LEN)
        .collect()
}
