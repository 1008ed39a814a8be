use async_trait::async_trait;
use aws_sdk_sts::error::DisplayErrorContext;
use aws_sdk_sts::Client as StsClient;
use chrono::{DateTime, Utc};
use log::debug;

use super::traits::RoleImpersonator;
use crate::error::{SawsError, SawsResult};
use crate::modules::aws::credentials::{AssumeRoleRequest, CredentialBundle};

/// Role impersonation backed by `sts:AssumeRole`, using the base identity the
/// client was built with.
pub struct StsModule {
    client: StsClient,
}

impl StsModule {
    pub fn new(client: StsClient) -> Self {
        Self { client }
    }

    pub fn from_config(config: &aws_config::SdkConfig) -> Self {
        Self::new(StsClient::new(config))
    }
}

#[async_trait]
impl RoleImpersonator for StsModule {
    async fn assume(&self, request: &AssumeRoleRequest) -> SawsResult<CredentialBundle> {
        let role_arn = request.role_arn();
        let session_name = request.session_name();
        let duration_secs = i32::try_from(request.duration.as_secs()).unwrap_or(i32::MAX);
        debug!("Attempting AssumeRole: ARN={}, SessionName={}", role_arn, session_name);

        let output = self
            .client
            .assume_role()
            .role_arn(&role_arn)
            .role_session_name(&session_name)
            .duration_seconds(duration_secs)
            .send()
            .await
            .map_err(|e| SawsError::Impersonation {
                role_arn: role_arn.clone(),
                source: DisplayErrorContext(&e).to_string().into(),
            })?;

        let creds = output
            .credentials()
            .ok_or_else(|| SawsError::IncompleteCredentials {
                role_arn: role_arn.clone(),
            })?;

        let expiration = creds.expiration();
        let bundle = into_bundle(
            &role_arn,
            creds.access_key_id(),
            creds.secret_access_key(),
            creds.session_token(),
            DateTime::<Utc>::from_timestamp(expiration.secs(), expiration.subsec_nanos()),
        )?;

        debug!("Successfully assumed role {}", role_arn);
        Ok(bundle)
    }
}

/// Fails closed: any missing credential field rejects the whole response.
fn into_bundle(
    role_arn: &str,
    access_key_id: &str,
    secret_access_key: &str,
    session_token: &str,
    expiration: Option<DateTime<Utc>>,
) -> SawsResult<CredentialBundle> {
    if access_key_id.is_empty() || secret_access_key.is_empty() || session_token.is_empty() {
        return Err(SawsError::IncompleteCredentials {
            role_arn: role_arn.to_string(),
        });
    }
    Ok(CredentialBundle {
        access_key_id: access_key_id.to_string(),
        secret_access_key: secret_access_key.to_string(),
        session_token: session_token.to_string(),
        expiration,
    })
}
