pub mod broker;
pub mod gateways;
pub mod rate_limiting;
pub mod redis_connection;
pub mod repositories;
pub mod state;

pub use broker::{KafkaEventPublisher, KafkaEventSource, KafkaSettings};
pub use gateways::{SimulatedPriceFetcher, SimulatedProviderRegistry};
pub use rate_limiting::{ProviderRateLimiter, RateLimitTable};
pub use redis_connection::{RedisConnection, RedisConnectionManager};
pub use repositories::{RedisMovingAverageRepository, RedisObservationRepository};
pub use state::RedisJobRepository;
