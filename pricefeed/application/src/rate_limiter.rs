use async_trait::async_trait;
use pricefeed_domain::Provider;
use shaku::Interface;
use std::time::Duration;

#[async_trait]
pub trait RateLimiter: Interface {
    /// Suspends until `provider` may be called again and records the call.
    /// Returns the delay that was applied.
    async fn wait(&self, provider: Provider) -> Result<Duration, RateLimiterError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RateLimiterError {
    #[error("Rate limiter backend unavailable: {0}")]
    Backend(String),

    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}
