pub mod redis;

pub use redis::{RedisMovingAverageRepository, RedisObservationRepository};
