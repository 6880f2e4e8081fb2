pub mod event_consumer;
pub mod job_orchestrator;
pub mod job_state;
pub mod moving_average_processor;
pub mod polling_service;
pub mod ports;
pub mod price_store;
pub mod rate_limiter;

pub use event_consumer::{ConsumerReport, EventConsumer, EventConsumerImpl};
pub use job_orchestrator::{JobOrchestrator, JobOrchestratorImpl, OrchestratorError};
pub use job_state::{JobRepository, JobRepositoryError};
pub use moving_average_processor::{
    MovingAverageProcessor, MovingAverageProcessorImpl, ProcessError, ProcessOutcome,
};
pub use polling_service::{
    Disposition, PollReport, PollingError, PollingRequest, PollingService, PollingServiceImpl,
    SymbolError,
};
pub use ports::{
    Delivery, EventPublisher, EventSource, FetchError, FetchedPrice, PriceFetcher,
    ProviderRegistry, PublishError, SourceError,
};
pub use price_store::{MovingAverageRepository, ObservationRepository, RepositoryError};
pub use rate_limiter::{RateLimiter, RateLimiterError};
