use crate::provider::Provider;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type ObservationId = String;

/// A single fetched price. The id doubles as the reference to the stored raw provider payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    id: ObservationId,
    symbol: String,
    provider: Provider,
    price: Decimal,
    timestamp: DateTime<Utc>,
}

impl Observation {
    pub fn new(
        id: ObservationId,
        symbol: String,
        provider: Provider,
        price: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, ObservationValidationError> {
        if id.is_empty() {
            return Err(ObservationValidationError::EmptyId);
        }

        if symbol.is_empty() {
            return Err(ObservationValidationError::EmptySymbol);
        }

        if price <= Decimal::ZERO {
            return Err(ObservationValidationError::InvalidPrice(price));
        }

        Ok(Self {
            id,
            symbol,
            provider,
            price,
            timestamp,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ObservationValidationError {
    #[error("Observation id cannot be empty")]
    EmptyId,
    #[error("Symbol cannot be empty")]
    EmptySymbol,
    #[error("Price must be positive, got {0}")]
    InvalidPrice(Decimal),
}
