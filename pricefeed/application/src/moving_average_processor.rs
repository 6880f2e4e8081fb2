use crate::price_store::{MovingAverageRepository, ObservationRepository, RepositoryError};
use async_trait::async_trait;
use chrono::Utc;
use pricefeed_domain::{moving_average, MovingAverage, PriceEvent, DEFAULT_WINDOW_SIZE};
use shaku::{Component, Interface};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Stored(MovingAverage),
    /// Fewer than a full window of observations exist for the symbol.
    InsufficientData { symbol: String, available: usize },
    /// The event arrived before its observation was readable.
    ObservationMissing { raw_response_id: String },
    /// The window's prices sum past what a `Decimal` can hold.
    Overflow { symbol: String },
}

#[async_trait]
pub trait MovingAverageProcessor: Interface {
    async fn process_payload(&self, payload: &[u8]) -> Result<ProcessOutcome, ProcessError>;

    async fn process_event(&self, event: &PriceEvent) -> Result<ProcessOutcome, ProcessError>;
}

#[derive(Component)]
#[shaku(interface = MovingAverageProcessor)]
pub struct MovingAverageProcessorImpl {
    #[shaku(inject)]
    observations: Arc<dyn ObservationRepository>,

    #[shaku(inject)]
    averages: Arc<dyn MovingAverageRepository>,

    #[shaku(default = DEFAULT_WINDOW_SIZE)]
    window_size: usize,
}

impl MovingAverageProcessorImpl {
    pub fn new(
        observations: Arc<dyn ObservationRepository>,
        averages: Arc<dyn MovingAverageRepository>,
        window_size: usize,
    ) -> Self {
        Self {
            observations,
            averages,
            window_size,
        }
    }
}

#[async_trait]
impl MovingAverageProcessor for MovingAverageProcessorImpl {
    async fn process_payload(&self, payload: &[u8]) -> Result<ProcessOutcome, ProcessError> {
        let event = PriceEvent::from_json(payload).map_err(ProcessError::Malformed)?;
        self.process_event(&event).await
    }

    async fn process_event(&self, event: &PriceEvent) -> Result<ProcessOutcome, ProcessError> {
        let Some(trigger) = self
            .observations
            .get_observation(&event.raw_response_id)
            .await?
        else {
            warn!(
                "Observation {} not found for {} event",
                event.raw_response_id, event.symbol
            );
            return Ok(ProcessOutcome::ObservationMissing {
                raw_response_id: event.raw_response_id.clone(),
            });
        };

        let recent = self
            .observations
            .recent_observations(&event.symbol, self.window_size)
            .await?;
        let prices: Vec<_> = recent.iter().map(|observation| observation.price()).collect();

        if self.window_size == 0 || prices.len() < self.window_size {
            debug!(
                "Insufficient data for {}-point MA of {}: {} observations",
                self.window_size,
                event.symbol,
                prices.len()
            );
            return Ok(ProcessOutcome::InsufficientData {
                symbol: event.symbol.clone(),
                available: prices.len(),
            });
        }

        let Some(value) = moving_average(&prices, self.window_size) else {
            warn!(
                "{}-point MA of {} overflows, leaving the stored value unchanged",
                self.window_size, event.symbol
            );
            return Ok(ProcessOutcome::Overflow {
                symbol: event.symbol.clone(),
            });
        };

        let average = MovingAverage::new(&trigger, self.window_size, value, Utc::now());
        self.averages.upsert_moving_average(&average).await?;

        info!(
            "Stored {}-point MA for {}: {}",
            self.window_size, event.symbol, value
        );
        Ok(ProcessOutcome::Stored(average))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Malformed price event: {0}")]
    Malformed(serde_json::Error),

    #[error("Persistence error: {0}")]
    Persistence(#[from] RepositoryError),
}
