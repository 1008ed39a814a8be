use async_trait::async_trait;

use crate::error::SawsResult;
use crate::modules::aws::credentials::{AssumeRoleRequest, CredentialBundle};

#[async_trait]
pub trait RoleImpersonator: Send + Sync {
    /// Performs one time-boxed role assumption. No retries: a failure is final.
    async fn assume(&self, request: &AssumeRoleRequest) -> SawsResult<CredentialBundle>;
}
