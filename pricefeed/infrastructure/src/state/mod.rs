pub mod redis;

pub use redis::{job_key, RedisJobRepository, JOB_INDEX_KEY};
