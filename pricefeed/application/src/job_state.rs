use async_trait::async_trait;
use pricefeed_domain::{JobStatus, PollingJob};
use shaku::Interface;

#[derive(Debug, thiserror::Error)]
pub enum JobRepositoryError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job {job_id} is {current:?} and cannot move to {requested:?}")]
    TerminalState {
        job_id: String,
        current: JobStatus,
        requested: JobStatus,
    },

    #[error("Backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait JobRepository: Interface {
    async fn save_job(&self, job: &PollingJob) -> Result<(), JobRepositoryError>;

    /// Rejects moving a job out of a terminal status. Re-writing the current status succeeds.
    async fn update_job_status(
        &self,
        job_id: &str,
        status: JobStatus,
    ) -> Result<(), JobRepositoryError>;

    async fn get_job(&self, job_id: &str) -> Result<Option<PollingJob>, JobRepositoryError>;

    async fn list_jobs(&self) -> Result<Vec<PollingJob>, JobRepositoryError>;
}
