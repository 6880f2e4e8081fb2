use crate::observation::Observation;
use crate::provider::Provider;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Wire message announcing one stored observation. Partitioned by `symbol`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceEvent {
    pub symbol: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
    pub source: Provider,
    pub raw_response_id: String,
}

impl PriceEvent {
    pub fn from_observation(observation: &Observation) -> Self {
        Self {
            symbol: observation.symbol().to_string(),
            price: observation.price(),
            timestamp: observation.timestamp(),
            source: observation.provider(),
            raw_response_id: observation.id().to_string(),
        }
    }

    pub fn partition_key(&self) -> &str {
        &self.symbol
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_json(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}
