use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use pricefeed_application::job_state::{JobRepository, JobRepositoryError};
use pricefeed_domain::{JobStatus, PollingJob, Provider};
use redis::aio::MultiplexedConnection;
use redis::Script;
use shaku::Component;
use tracing::debug;

use crate::redis_connection::RedisConnection;

pub const JOB_INDEX_KEY: &str = "pricefeed:jobs";

const FIELD_ID: &str = "id";
const FIELD_SYMBOLS: &str = "symbols";
const FIELD_INTERVAL_SECS: &str = "interval_secs";
const FIELD_PROVIDER: &str = "provider";
const FIELD_STATUS: &str = "status";
const FIELD_CREATED_AT: &str = "created_at";

lazy_static! {
    // Returns {1, current} when written (or already at the requested status),
    // {0, current} when the transition is refused and {-1, ''} when the job is unknown.
    static ref UPDATE_STATUS_SCRIPT: Script = Script::new(
        r#"
        local requested = ARGV[1]
        local current = redis.call('HGET', KEYS[1], 'status')
        if not current then
            return {-1, ''}
        end
        if current == requested then
            return {1, current}
        end
        if current == 'completed' or current == 'failed' then
            return {0, current}
        end
        if current == 'running' and requested == 'accepted' then
            return {0, current}
        end
        redis.call('HSET', KEYS[1], 'status', requested)
        return {1, current}
    "#
    );
}

pub fn job_key(job_id: &str) -> String {
    format!("pricefeed:job:{}", job_id)
}

#[derive(Component)]
#[shaku(interface = JobRepository)]
pub struct RedisJobRepository {
    #[shaku(inject)]
    redis: Arc<dyn RedisConnection>,
}

impl RedisJobRepository {
    pub fn new(redis: Arc<dyn RedisConnection>) -> Self {
        Self { redis }
    }

    async fn connection(&self) -> Result<MultiplexedConnection, JobRepositoryError> {
        self.redis
            .get_connection()
            .await
            .map_err(|e| JobRepositoryError::Backend(e.to_string()))
    }

    async fn read_job(
        &self,
        conn: &mut MultiplexedConnection,
        job_id: &str,
    ) -> Result<Option<PollingJob>, JobRepositoryError> {
        let fields: HashMap<String, String> = redis::cmd("HGETALL")
            .arg(job_key(job_id))
            .query_async(conn)
            .await
            .map_err(|e| JobRepositoryError::Backend(e.to_string()))?;

        if fields.is_empty() {
            return Ok(None);
        }

        parse_job(job_id, &fields).map(Some)
    }
}

#[async_trait]
impl JobRepository for RedisJobRepository {
    async fn save_job(&self, job: &PollingJob) -> Result<(), JobRepositoryError> {
        let symbols = serde_json::to_string(job.symbols())
            .map_err(|e| JobRepositoryError::Backend(e.to_string()))?;

        let mut conn = self.connection().await?;
        redis::pipe()
            .atomic()
            .hset_multiple(
                job_key(job.id()),
                &[
                    (FIELD_ID, job.id().to_string()),
                    (FIELD_SYMBOLS, symbols),
                    (FIELD_INTERVAL_SECS, job.interval_secs().to_string()),
                    (FIELD_PROVIDER, job.provider().as_str().to_string()),
                    (FIELD_STATUS, job.status().as_str().to_string()),
                    (
                        FIELD_CREATED_AT,
                        job.created_at().timestamp_millis().to_string(),
                    ),
                ],
            )
            .ignore()
            .sadd(JOB_INDEX_KEY, job.id())
            .ignore()
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| JobRepositoryError::Backend(e.to_string()))
    }

    async fn update_job_status(
        &self,
        job_id: &str,
        status: JobStatus,
    ) -> Result<(), JobRepositoryError> {
        let mut conn = self.connection().await?;
        let mut script_invocation = UPDATE_STATUS_SCRIPT.prepare_invoke();
        script_invocation.key(job_key(job_id)).arg(status.as_str());

        let (result, current): (i32, String) = script_invocation
            .invoke_async(&mut conn)
            .await
            .map_err(|e| JobRepositoryError::Backend(e.to_string()))?;

        match result {
            1 => {
                debug!(job_id, "Job status {} -> {}", current, status.as_str());
                Ok(())
            }
            0 => Err(JobRepositoryError::TerminalState {
                job_id: job_id.to_string(),
                current: parse_status(&current)?,
                requested: status,
            }),
            -1 => Err(JobRepositoryError::NotFound(job_id.to_string())),
            _ => Err(JobRepositoryError::Backend(format!(
                "Unexpected script result {}",
                result
            ))),
        }
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<PollingJob>, JobRepositoryError> {
        let mut conn = self.connection().await?;
        self.read_job(&mut conn, job_id).await
    }

    async fn list_jobs(&self) -> Result<Vec<PollingJob>, JobRepositoryError> {
        let mut conn = self.connection().await?;
        let ids: Vec<String> = redis::cmd("SMEMBERS")
            .arg(JOB_INDEX_KEY)
            .query_async(&mut conn)
            .await
            .map_err(|e| JobRepositoryError::Backend(e.to_string()))?;

        let mut jobs = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(job) = self.read_job(&mut conn, &id).await? {
                jobs.push(job);
            }
        }
        Ok(jobs)
    }
}

fn parse_job(job_id: &str, fields: &HashMap<String, String>) -> Result<PollingJob, JobRepositoryError> {
    let field = |name: &str| {
        fields.get(name).ok_or_else(|| {
            JobRepositoryError::Backend(format!("Job {} is missing field '{}'", job_id, name))
        })
    };

    let symbols: Vec<String> = serde_json::from_str(field(FIELD_SYMBOLS)?)
        .map_err(|e| JobRepositoryError::Backend(format!("Invalid symbols: {}", e)))?;
    let interval_secs = field(FIELD_INTERVAL_SECS)?
        .parse::<u64>()
        .map_err(|e| JobRepositoryError::Backend(format!("Invalid interval: {}", e)))?;
    let provider = field(FIELD_PROVIDER)?
        .parse::<Provider>()
        .map_err(|e| JobRepositoryError::Backend(e.to_string()))?;
    let status = parse_status(field(FIELD_STATUS)?)?;
    let created_at = parse_created_at(field(FIELD_CREATED_AT)?)?;

    Ok(PollingJob::restore(
        job_id.to_string(),
        symbols,
        interval_secs,
        provider,
        status,
        created_at,
    ))
}

fn parse_status(raw: &str) -> Result<JobStatus, JobRepositoryError> {
    JobStatus::from_str(raw).ok_or_else(|| {
        JobRepositoryError::Backend(format!("Unrecognized job status value '{}'", raw))
    })
}

fn parse_created_at(raw: &str) -> Result<DateTime<Utc>, JobRepositoryError> {
    raw.parse::<i64>()
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .ok_or_else(|| JobRepositoryError::Backend(format!("Invalid created_at '{}'", raw)))
}
