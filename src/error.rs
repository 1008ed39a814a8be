use thiserror::Error;

/// Failures raised by the fan-out engine.
///
/// Setup and selection variants abort a run before any unit is spawned.
/// `Impersonation` and `IncompleteCredentials` are only ever recorded against
/// a single unit.
#[derive(Debug, Error)]
pub enum SawsError {
    #[error("SAWS config error: {0}")]
    Config(String),

    #[error("selector '{selector}' did not match any accounts in SAWS config")]
    NoMatch { selector: String },

    #[error("selector '{0}' provided no valid names/patterns")]
    EmptySelector(String),

    #[error("regions input '{input}' contained no valid region names after trimming")]
    NoValidRegion { input: String },

    #[error("required tool '{tool}' not found in PATH")]
    ToolMissing { tool: String },

    #[error("sts:AssumeRole call failed for role ARN {role_arn}: {source}")]
    Impersonation {
        role_arn: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("assume role response for role ARN {role_arn} did not contain valid credentials")]
    IncompleteCredentials { role_arn: String },
}

pub type SawsResult<T> = std::result::Result<T, SawsError>;
