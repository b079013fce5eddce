//! Rate Limiting Middleware using GCRA Algorithm
//!
//! Per-client-IP limiting via tower_governor. Disabled unless
//! `RATE_LIMIT_PER_SECOND` is set.

use governor::middleware::StateInformationMiddleware;
use std::sync::Arc;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::PeerIpKeyExtractor;
use tower_governor::GovernorLayer;

use crate::config::SettingsError;

/// Governor config keyed by peer IP, reporting quota in X-RateLimit-* headers
pub type DefaultGovernorConfig =
    tower_governor::governor::GovernorConfig<PeerIpKeyExtractor, StateInformationMiddleware>;

/// Rate limiting configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Sustained requests per second per client
    pub requests_per_second: u64,
    /// Burst size (max requests that can be made immediately)
    pub burst_size: u32,
}

impl RateLimitConfig {
    /// Interval between replenished cells
    fn replenish_interval_ms(&self) -> u64 {
        (1000 / self.requests_per_second.max(1)).max(1)
    }
}

/// Create a rate limiting governor config.
///
/// Requires the service to be served with
/// `into_make_service_with_connect_info::<SocketAddr>()` for IP extraction.
pub fn create_governor_config(
    config: &RateLimitConfig,
) -> Result<Arc<DefaultGovernorConfig>, SettingsError> {
    GovernorConfigBuilder::default()
        .per_millisecond(config.replenish_interval_ms())
        .burst_size(config.burst_size)
        .use_headers()
        .finish()
        .map(Arc::new)
        .ok_or_else(|| SettingsError::InvalidValue {
            key: "RATE_LIMIT_BURST",
            message: "burst size and rate must both be non-zero".to_string(),
        })
}

/// Tower layer enforcing the given limits
pub fn layer(
    config: &RateLimitConfig,
) -> Result<GovernorLayer<PeerIpKeyExtractor, StateInformationMiddleware>, SettingsError> {
    Ok(GovernorLayer {
        config: create_governor_config(config)?,
    })
}
