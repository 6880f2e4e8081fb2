use crate::observation::Observation;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const DEFAULT_WINDOW_SIZE: usize = 5;

/// Mean of the first `size` prices of `window` (most recent first).
///
/// Returns `None` when the window holds fewer than `size` prices, `size` is zero,
/// or the sum does not fit in a `Decimal`.
pub fn moving_average(window: &[Decimal], size: usize) -> Option<Decimal> {
    if size == 0 || window.len() < size {
        return None;
    }

    let total = window[..size]
        .iter()
        .try_fold(Decimal::ZERO, |total, price| total.checked_add(*price))?;
    total.checked_div(Decimal::from(size))
}

/// Latest aggregate for a symbol. At most one is kept per symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovingAverage {
    symbol: String,
    window_size: usize,
    value: Decimal,
    observation_count: usize,
    timestamp: DateTime<Utc>,
    trigger_observation_id: String,
    calculated_at: DateTime<Utc>,
}

impl MovingAverage {
    pub fn new(
        trigger: &Observation,
        window_size: usize,
        value: Decimal,
        calculated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: trigger.symbol().to_string(),
            window_size,
            value,
            observation_count: window_size,
            timestamp: trigger.timestamp(),
            trigger_observation_id: trigger.id().to_string(),
            calculated_at,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn value(&self) -> Decimal {
        self.value
    }

    pub fn observation_count(&self) -> usize {
        self.observation_count
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn trigger_observation_id(&self) -> &str {
        &self.trigger_observation_id
    }

    pub fn calculated_at(&self) -> DateTime<Utc> {
        self.calculated_at
    }
}
