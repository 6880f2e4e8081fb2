use async_trait::async_trait;
use pricefeed_domain::{Observation, PriceEvent, Provider};
use shaku::Interface;
use std::sync::Arc;
use std::time::Duration;

/// One observation as returned by a provider, plus the untouched provider payload.
#[derive(Debug, Clone)]
pub struct FetchedPrice {
    pub observation: Observation,
    pub raw: serde_json::Value,
}

#[async_trait]
pub trait PriceFetcher: Send + Sync {
    fn provider(&self) -> Provider;

    async fn fetch(&self, symbol: &str) -> Result<FetchedPrice, FetchError>;
}

/// Lookup table from provider to the fetcher that serves it.
pub trait ProviderRegistry: Interface {
    fn fetcher(&self, provider: Provider) -> Option<Arc<dyn PriceFetcher>>;

    fn providers(&self) -> Vec<Provider>;

    fn is_registered(&self, provider: Provider) -> bool {
        self.providers().contains(&provider)
    }
}

#[async_trait]
pub trait EventPublisher: Interface {
    /// Publishes keyed by symbol. An error means the client's retries were exhausted.
    async fn publish(&self, event: &PriceEvent) -> Result<(), PublishError>;

    /// Waits for queued sends to be acknowledged, returning how many are still outstanding.
    async fn flush(&self, timeout: Duration) -> usize;
}

/// A message handed out by an [`EventSource`], detached from the client that read it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub payload: Vec<u8>,
}

#[async_trait]
pub trait EventSource: Interface {
    async fn poll(&self, timeout: Duration) -> Result<Option<Delivery>, SourceError>;

    /// Marks everything up to and including `delivery` as processed.
    async fn commit(&self, delivery: &Delivery) -> Result<(), SourceError>;

    /// Re-positions the source so that `delivery` is handed out again.
    async fn rewind(&self, delivery: &Delivery) -> Result<(), SourceError>;

    async fn close(&self);
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Request to {provider} failed: {reason}")]
    RequestFailed { provider: Provider, reason: String },

    #[error("No data found for symbol: {0}")]
    NoData(String),

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Broker client unavailable: {0}")]
    ClientUnavailable(String),

    #[error("Delivery failed for {symbol} after {attempts} attempts: {reason}")]
    DeliveryFailed {
        symbol: String,
        attempts: u32,
        reason: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Consumer client unavailable: {0}")]
    ClientUnavailable(String),

    #[error("Receive failed: {0}")]
    Receive(String),

    #[error("Offset commit failed: {0}")]
    Commit(String),

    #[error("Seek failed: {0}")]
    Seek(String),
}
