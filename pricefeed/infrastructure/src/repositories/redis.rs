use std::sync::Arc;

use async_trait::async_trait;
use pricefeed_application::price_store::{
    MovingAverageRepository, ObservationRepository, RepositoryError,
};
use pricefeed_domain::{MovingAverage, Observation};
use redis::aio::MultiplexedConnection;
use shaku::Component;

use crate::redis_connection::RedisConnection;

pub fn observation_key(id: &str) -> String {
    format!("pricefeed:observation:{}", id)
}

pub fn raw_response_key(id: &str) -> String {
    format!("pricefeed:raw:{}", id)
}

/// Sorted set of observation ids per symbol, scored by timestamp in milliseconds.
pub fn symbol_index_key(symbol: &str) -> String {
    format!("pricefeed:observations:{}", symbol)
}

pub fn moving_average_key(symbol: &str) -> String {
    format!("pricefeed:moving_average:{}", symbol)
}

async fn connect(redis: &dyn RedisConnection) -> Result<MultiplexedConnection, RepositoryError> {
    redis
        .get_connection()
        .await
        .map_err(|e| RepositoryError::Connection(e.to_string()))
}

fn backend(e: redis::RedisError) -> RepositoryError {
    RepositoryError::Backend(e.to_string())
}

#[derive(Component)]
#[shaku(interface = ObservationRepository)]
pub struct RedisObservationRepository {
    #[shaku(inject)]
    redis: Arc<dyn RedisConnection>,
}

impl RedisObservationRepository {
    pub fn new(redis: Arc<dyn RedisConnection>) -> Self {
        Self { redis }
    }

    /// The provider payload stored next to an observation.
    pub async fn raw_response(&self, id: &str) -> Result<Option<serde_json::Value>, RepositoryError> {
        let mut conn = connect(self.redis.as_ref()).await?;
        let payload: Option<String> = redis::cmd("GET")
            .arg(raw_response_key(id))
            .query_async(&mut conn)
            .await
            .map_err(backend)?;

        payload
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(RepositoryError::from)
    }
}

#[async_trait]
impl ObservationRepository for RedisObservationRepository {
    async fn save_observation(
        &self,
        observation: &Observation,
        raw: &serde_json::Value,
    ) -> Result<(), RepositoryError> {
        let record = serde_json::to_string(observation)?;
        let raw = serde_json::to_string(raw)?;

        let mut conn = connect(self.redis.as_ref()).await?;
        redis::pipe()
            .atomic()
            .set(raw_response_key(observation.id()), raw)
            .ignore()
            .set(observation_key(observation.id()), record)
            .ignore()
            .zadd(
                symbol_index_key(observation.symbol()),
                observation.id(),
                observation.timestamp().timestamp_millis(),
            )
            .ignore()
            .query_async::<()>(&mut conn)
            .await
            .map_err(backend)
    }

    async fn get_observation(&self, id: &str) -> Result<Option<Observation>, RepositoryError> {
        let mut conn = connect(self.redis.as_ref()).await?;
        let record: Option<String> = redis::cmd("GET")
            .arg(observation_key(id))
            .query_async(&mut conn)
            .await
            .map_err(backend)?;

        Ok(record
            .map(|raw| serde_json::from_str(&raw))
            .transpose()?)
    }

    async fn recent_observations(
        &self,
        symbol: &str,
        limit: usize,
    ) -> Result<Vec<Observation>, RepositoryError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut conn = connect(self.redis.as_ref()).await?;
        let ids: Vec<String> = redis::cmd("ZREVRANGE")
            .arg(symbol_index_key(symbol))
            .arg(0)
            .arg(limit as isize - 1)
            .query_async(&mut conn)
            .await
            .map_err(backend)?;

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = ids.iter().map(|id| observation_key(id)).collect();
        let records: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await
            .map_err(backend)?;

        records
            .into_iter()
            .flatten()
            .map(|raw| serde_json::from_str(&raw).map_err(RepositoryError::from))
            .collect()
    }
}

#[derive(Component)]
#[shaku(interface = MovingAverageRepository)]
pub struct RedisMovingAverageRepository {
    #[shaku(inject)]
    redis: Arc<dyn RedisConnection>,
}

impl RedisMovingAverageRepository {
    pub fn new(redis: Arc<dyn RedisConnection>) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl MovingAverageRepository for RedisMovingAverageRepository {
    async fn upsert_moving_average(&self, average: &MovingAverage) -> Result<(), RepositoryError> {
        let record = serde_json::to_string(average)?;

        let mut conn = connect(self.redis.as_ref()).await?;
        redis::cmd("SET")
            .arg(moving_average_key(average.symbol()))
            .arg(record)
            .query_async::<()>(&mut conn)
            .await
            .map_err(backend)
    }

    async fn get_moving_average(
        &self,
        symbol: &str,
    ) -> Result<Option<MovingAverage>, RepositoryError> {
        let mut conn = connect(self.redis.as_ref()).await?;
        let record: Option<String> = redis::cmd("GET")
            .arg(moving_average_key(symbol))
            .query_async(&mut conn)
            .await
            .map_err(backend)?;

        Ok(record
            .map(|raw| serde_json::from_str(&raw))
            .transpose()?)
    }
}
