use aws_config::BehaviorVersion;
use log::debug;

use super::clients::sts::StsModule;
use crate::utils::region::{BASE_PROFILE, FALLBACK_REGION};

/// Loads the base identity used for every role assumption: the `default`
/// profile, with STS calls pinned to the fallback region.
pub async fn get_base_config() -> aws_config::SdkConfig {
    debug!(
        "Loading base AWS config (profile '{}', region '{}')",
        BASE_PROFILE, FALLBACK_REGION
    );
    aws_config::defaults(BehaviorVersion::latest())
        .profile_name(BASE_PROFILE)
        .region(aws_config::Region::new(FALLBACK_REGION))
        .load()
        .await
}

pub async fn aws_sts_client() -> StsModule {
    let config = get_base_config().await;
    StsModule::from_config(&config)
}
