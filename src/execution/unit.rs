use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// One (account, region) work item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionUnit {
    pub account_name: String,
    pub region: String,
    pub role_name: String,
    pub command: Arc<str>,
}

/// Builds one unit per (account, region) pair, accounts outermost.
///
/// Inputs are expected to be deduplicated already (the selector and region
/// resolver guarantee it), so the output has exactly `accounts × regions` units.
pub fn cross_product(
    accounts: &[String],
    regions: &[String],
    role_name: &str,
    command: &str,
) -> Vec<ExecutionUnit> {
    let command: Arc<str> = Arc::from(command);
    accounts
        .iter()
        .flat_map(|account| {
            let command = command.clone();
            regions.iter().map(move |region| ExecutionUnit {
                account_name: account.clone(),
                region: region.clone(),
                role_name: role_name.to_string(),
                command: command.clone(),
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitStatus {
    Success,
    Failed,
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitStatus::Success => write!(f, "SUCCESS"),
            UnitStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Why a unit failed before or instead of producing a subprocess exit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitFailure {
    UnknownAccount,
    Impersonation(String),
    Spawn(String),
    Cancelled,
}

impl fmt::Display for UnitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitFailure::UnknownAccount => write!(f, "account id not found in SAWS config"),
            UnitFailure::Impersonation(e) => write!(f, "assume role failed: {}", e),
            UnitFailure::Spawn(e) => write!(f, "command could not be executed: {}", e),
            UnitFailure::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Exit code recorded when no subprocess exit code is available.
pub const SENTINEL_EXIT_CODE: i32 = -1;

/// The outcome of exactly one execution unit.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub account_name: String,
    pub region: String,
    pub status: UnitStatus,
    pub exit_code: i32,
    pub duration: Duration,
    pub stdout: String,
    pub stderr: String,
    pub failure: Option<UnitFailure>,
}

impl ExecutionResult {
    pub fn from_exit(
        unit: &ExecutionUnit,
        exit_code: i32,
        duration: Duration,
        stdout: String,
        stderr: String,
    ) -> Self {
        let status = if exit_code == 0 {
            UnitStatus::Success
        } else {
            UnitStatus::Failed
        };
        Self {
            account_name: unit.account_name.clone(),
            region: unit.region.clone(),
            status,
            exit_code,
            duration,
            stdout,
            stderr,
            failure: None,
        }
    }

    pub fn failed(unit: &ExecutionUnit, failure: UnitFailure, duration: Duration) -> Self {
        Self {
            account_name: unit.account_name.clone(),
            region: unit.region.clone(),
            status: UnitStatus::Failed,
            exit_code: SENTINEL_EXIT_CODE,
            duration,
            stdout: String::new(),
            stderr: String::new(),
            failure: Some(failure),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == UnitStatus::Success
    }

    pub fn key(&self) -> (&str, &str) {
        (&self.account_name, &self.region)
    }
}
