use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};

use crate::modules::aws::credentials::CredentialBundle;

pub const AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const AWS_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";
pub const AWS_REGION: &str = "AWS_REGION";
pub const AWS_DEFAULT_REGION: &str = "AWS_DEFAULT_REGION";

/// Variables never inherited from the parent process.
pub const DENYLIST: &[&str] = &[
    AWS_ACCESS_KEY_ID,
    AWS_SECRET_ACCESS_KEY,
    AWS_SESSION_TOKEN,
    "AWS_SECURITY_TOKEN",
    AWS_REGION,
    AWS_DEFAULT_REGION,
    "AWS_CONFIG_FILE",
    "AWS_SHARED_CREDENTIALS_FILE",
    "AWS_PROFILE",
];

/// A complete subprocess environment. Names and values are kept as OS strings
/// so non-UTF-8 entries pass through untouched.
pub type Environment = BTreeMap<OsString, OsString>;

/// Base environment minus [`DENYLIST`], plus the unit's credentials and region.
///
/// The result is keyed by variable name, so duplicate entries in `base`
/// collapse and every overlay variable appears exactly once.
pub fn isolated_environment<I, K, V>(base: I, credentials: &CredentialBundle, region: &str) -> Environment
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<OsString>,
    V: Into<OsString>,
{
    let mut env: Environment = base
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .filter(|(k, _)| !is_denied(k))
        .collect();

    env.insert(AWS_ACCESS_KEY_ID.into(), credentials.access_key_id.clone().into());
    env.insert(
        AWS_SECRET_ACCESS_KEY.into(),
        credentials.secret_access_key.clone().into(),
    );
    env.insert(AWS_SESSION_TOKEN.into(), credentials.session_token.clone().into());
    env.insert(AWS_REGION.into(), region.into());
    env.insert(AWS_DEFAULT_REGION.into(), region.into());
    env
}

fn is_denied(name: &OsStr) -> bool {
    DENYLIST.iter().any(|denied| name == OsStr::new(denied))
}

/// Reads one variable as UTF-8, `None` when absent or not valid UTF-8.
pub fn lookup<'a>(env: &'a Environment, name: &str) -> Option<&'a str> {
    env.get(OsStr::new(name)).and_then(|v| v.to_str())
}

/// Snapshot of the current process environment, byte-exact.
pub fn process_environment() -> Vec<(OsString, OsString)> {
    std::env::vars_os().collect()
}
