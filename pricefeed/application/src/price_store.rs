use async_trait::async_trait;
use pricefeed_domain::{MovingAverage, Observation};
use shaku::Interface;

#[async_trait]
pub trait ObservationRepository: Interface {
    /// Stores the observation together with the raw provider payload it was parsed from.
    async fn save_observation(
        &self,
        observation: &Observation,
        raw: &serde_json::Value,
    ) -> Result<(), RepositoryError>;

    async fn get_observation(&self, id: &str) -> Result<Option<Observation>, RepositoryError>;

    /// Most recent observations for `symbol`, newest first.
    async fn recent_observations(
        &self,
        symbol: &str,
        limit: usize,
    ) -> Result<Vec<Observation>, RepositoryError>;
}

#[async_trait]
pub trait MovingAverageRepository: Interface {
    /// Insert-or-replace keyed by symbol.
    async fn upsert_moving_average(&self, average: &MovingAverage) -> Result<(), RepositoryError>;

    async fn get_moving_average(
        &self,
        symbol: &str,
    ) -> Result<Option<MovingAverage>, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Backend error: {0}")]
    Backend(String),
}
