//! Runtime configuration
//!
//! Everything is environment-driven with sensible defaults; CLI flags
//! override on top. A `.env` file is honoured via `dotenvy` at startup.

use std::time::Duration;

pub use crate::db::pool::{DatabaseConfig, SslMode};

/// Default Conversion Service request timeout.
///
/// Bulk row population of a large zoning can run for minutes; a hang
/// beyond this is treated as a conversion failure.
const DEFAULT_CONVERT_TIMEOUT_SECS: u64 = 600;

/// Conversion Service settings
#[derive(Debug, Clone)]
pub struct ConversionConfig {
    /// Base URL of the service, e.g. `http://ogr2ogr:8000`
    pub base_url: String,
    /// Request timeout; hitting it counts as a conversion failure
    pub timeout: Duration,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8200".into(),
            timeout: Duration::from_secs(DEFAULT_CONVERT_TIMEOUT_SECS),
        }
    }
}

impl ConversionConfig {
    /// Loads the configuration from `CONVERT_URL` / `CONVERT_TIMEOUT_SECS`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("CONVERT_URL").unwrap_or(defaults.base_url),
            timeout: std::env::var("CONVERT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }
}
