pub mod config;
pub mod region;
pub mod selector;

pub use config::AppConfig;
pub use region::{ProfileRegionProbe, RegionProbe};
