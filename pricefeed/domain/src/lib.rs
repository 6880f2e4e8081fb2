pub mod moving_average;
pub mod observation;
pub mod polling_job;
pub mod price_event;
pub mod provider;

pub use moving_average::{moving_average, MovingAverage, DEFAULT_WINDOW_SIZE};
pub use observation::{Observation, ObservationId, ObservationValidationError};
pub use polling_job::{JobId, JobStatus, JobValidationError, PollingJob};
pub use price_event::PriceEvent;
pub use provider::{Provider, UnknownProvider};
