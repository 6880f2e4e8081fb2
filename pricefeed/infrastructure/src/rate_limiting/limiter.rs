use async_trait::async_trait;
use pricefeed_application::rate_limiter::{RateLimiter, RateLimiterError};
use pricefeed_domain::Provider;
use shaku::Component;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Minimum spacing between two calls to the same provider.
pub fn default_interval(provider: Provider) -> Duration {
    match provider {
        // Free tier: 5 requests per minute.
        Provider::AlphaVantage => Duration::from_secs(12),
        Provider::YahooFinance => Duration::from_secs(1),
        Provider::Finnhub => Duration::from_secs(1),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitTable {
    intervals: HashMap<Provider, Duration>,
}

impl RateLimitTable {
    pub fn with_interval(mut self, provider: Provider, interval: Duration) -> Self {
        self.intervals.insert(provider, interval);
        self
    }

    pub fn interval(&self, provider: Provider) -> Duration {
        self.intervals
            .get(&provider)
            .copied()
            .unwrap_or_else(|| default_interval(provider))
    }
}

impl Default for RateLimitTable {
    fn default() -> Self {
        Self {
            intervals: Provider::ALL
                .iter()
                .map(|provider| (*provider, default_interval(*provider)))
                .collect(),
        }
    }
}

type Slot = Arc<tokio::sync::Mutex<Option<Instant>>>;

/// Last call instant per provider. Each slot is locked across the wait, so callers of one
/// provider queue up behind each other while other providers stay unaffected.
#[derive(Default)]
pub struct ProviderSlots {
    slots: Mutex<HashMap<Provider, Slot>>,
}

impl ProviderSlots {
    fn get(&self, provider: Provider) -> Result<Slot, RateLimiterError> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| RateLimiterError::Unexpected("slot table poisoned".to_string()))?;
        Ok(slots.entry(provider).or_default().clone())
    }
}

#[derive(Component)]
#[shaku(interface = RateLimiter)]
pub struct ProviderRateLimiter {
    #[shaku(default = RateLimitTable::default())]
    limits: RateLimitTable,

    slots: ProviderSlots,
}

impl ProviderRateLimiter {
    pub fn new(limits: RateLimitTable) -> Self {
        Self {
            limits,
            slots: ProviderSlots::default(),
        }
    }
}

#[async_trait]
impl RateLimiter for ProviderRateLimiter {
    async fn wait(&self, provider: Provider) -> Result<Duration, RateLimiterError> {
        let slot = self.slots.get(provider)?;
        let mut last_call = slot.lock().await;

        let min_interval = self.limits.interval(provider);
        let delay = last_call
            .map(|last| min_interval.saturating_sub(last.elapsed()))
            .unwrap_or(Duration::ZERO);

        if !delay.is_zero() {
            debug!(
                provider = provider.as_str(),
                "Rate limit: waiting {:?} before next request", delay
            );
            tokio::time::sleep(delay).await;
        }

        *last_call = Some(Instant::now());
        Ok(delay)
    }
}
