use async_trait::async_trait;
use aws_config::BehaviorVersion;
use log::debug;

use crate::error::{SawsError, SawsResult};

pub const FALLBACK_REGION: &str = "eu-west-1";
pub const BASE_PROFILE: &str = "default";

/// Source of the invoking identity's default region.
#[async_trait]
pub trait RegionProbe: Send + Sync {
    async fn default_region(&self) -> Option<String>;
}

/// Reads the region the AWS SDK would pick for the base profile
/// (environment, then shared config files).
pub struct ProfileRegionProbe {
    profile: String,
}

impl ProfileRegionProbe {
    pub fn new(profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
        }
    }
}

impl Default for ProfileRegionProbe {
    fn default() -> Self {
        Self::new(BASE_PROFILE)
    }
}

#[async_trait]
impl RegionProbe for ProfileRegionProbe {
    async fn default_region(&self) -> Option<String> {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .profile_name(&self.profile)
            .load()
            .await;
        config
            .region()
            .map(|r| r.to_string())
            .filter(|r| !r.is_empty())
    }
}

/// Resolves the fan-out region list.
///
/// Explicit input wins; otherwise the probe's default region; otherwise
/// [`FALLBACK_REGION`]. Each tier is consulted only when the previous one is empty.
pub async fn resolve(explicit: Option<&str>, probe: &dyn RegionProbe) -> SawsResult<Vec<String>> {
    if let Some(input) = explicit.map(str::trim).filter(|s| !s.is_empty()) {
        let mut regions: Vec<String> = Vec::new();
        for region in input.split(',').map(str::trim).filter(|r| !r.is_empty()) {
            if !regions.iter().any(|r| r == region) {
                regions.push(region.to_string());
            }
        }
        if regions.is_empty() {
            return Err(SawsError::NoValidRegion {
                input: input.to_string(),
            });
        }
        debug!("Using specified regions: {:?}", regions);
        return Ok(regions);
    }

    Ok(vec![resolve_default(probe).await])
}

/// Resolves a single region for one-shot session flows.
pub async fn resolve_single(explicit: Option<&str>, probe: &dyn RegionProbe) -> String {
    match explicit.map(str::trim).filter(|s| !s.is_empty()) {
        Some(region) => region.to_string(),
        None => resolve_default(probe).await,
    }
}

async fn resolve_default(probe: &dyn RegionProbe) -> String {
    match probe.default_region().await {
        Some(region) => {
            debug!("Using default region from AWS config/environment: {}", region);
            region
        }
        None => {
            debug!(
                "Could not determine default region from AWS config/environment, falling back to '{}'",
                FALLBACK_REGION
            );
            FALLBACK_REGION.to_string()
        }
    }
}
