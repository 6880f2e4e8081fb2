use crate::job_state::{JobRepository, JobRepositoryError};
use crate::polling_service::{PollingError, PollingRequest, PollingService};
use async_trait::async_trait;
use futures::future::join_all;
use futures::FutureExt;
use pricefeed_domain::{JobId, JobStatus, JobValidationError, PollingJob};
use shaku::{Component, Interface};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[async_trait]
pub trait JobOrchestrator: Interface {
    /// Validates the request, records the job as `accepted` and starts its task.
    async fn create(&self, request: PollingRequest) -> Result<JobId, OrchestratorError>;

    /// Cancels a running job and waits for it to exit. `false` when no task is active for the id.
    async fn stop(&self, job_id: &str) -> bool;

    async fn status(&self, job_id: &str) -> Result<Option<PollingJob>, OrchestratorError>;

    async fn list(&self) -> Result<Vec<PollingJob>, OrchestratorError>;

    async fn active_count(&self) -> usize;

    /// Cancels every active job and waits for all of them. Safe to call more than once.
    async fn shutdown(&self);
}

/// Tasks currently running, keyed by job id.
#[derive(Default)]
pub struct ActiveJobs {
    tasks: Mutex<HashMap<JobId, ActiveJob>>,
}

struct ActiveJob {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ActiveJobs {
    async fn take(&self, job_id: &str) -> Option<ActiveJob> {
        self.tasks.lock().await.remove(job_id)
    }

    async fn drain(&self) -> Vec<ActiveJob> {
        self.tasks.lock().await.drain().map(|(_, job)| job).collect()
    }

    async fn len(&self) -> usize {
        self.tasks.lock().await.len()
    }
}

#[derive(Component)]
#[shaku(interface = JobOrchestrator)]
pub struct JobOrchestratorImpl {
    #[shaku(inject)]
    polling: Arc<dyn PollingService>,

    #[shaku(inject)]
    jobs: Arc<dyn JobRepository>,

    active: Arc<ActiveJobs>,

    shutdown: CancellationToken,
}

impl JobOrchestratorImpl {
    pub fn new(polling: Arc<dyn PollingService>, jobs: Arc<dyn JobRepository>) -> Self {
        Self {
            polling,
            jobs,
            active: Arc::new(ActiveJobs::default()),
            shutdown: CancellationToken::new(),
        }
    }
}

#[async_trait]
impl JobOrchestrator for JobOrchestratorImpl {
    async fn create(&self, request: PollingRequest) -> Result<JobId, OrchestratorError> {
        if self.shutdown.is_cancelled() {
            return Err(OrchestratorError::ShuttingDown);
        }

        let job = self.polling.validate(&request)?;
        self.jobs.save_job(&job).await?;

        let job_id = job.id().to_string();
        let cancel = self.shutdown.child_token();

        // Registered under the lock so the task cannot deregister before it is inserted.
        let mut tasks = self.active.tasks.lock().await;

        // Shutdown cancels before it drains, so this check under the lock sees it.
        if self.shutdown.is_cancelled() {
            drop(tasks);
            warn!(job_id = job_id.as_str(), "Shutdown began while job was being saved");
            record_status(self.jobs.as_ref(), &job_id, JobStatus::Failed).await;
            return Err(OrchestratorError::ShuttingDown);
        }

        let handle = tokio::spawn(drive_job(
            job,
            cancel.clone(),
            self.polling.clone(),
            self.jobs.clone(),
            self.active.clone(),
        ));
        tasks.insert(job_id.clone(), ActiveJob { cancel, handle });
        drop(tasks);

        info!(
            job_id = job_id.as_str(),
            "Created polling job for {:?}",
            request.symbols
        );
        Ok(job_id)
    }

    async fn stop(&self, job_id: &str) -> bool {
        let Some(active) = self.active.take(job_id).await else {
            return false;
        };

        active.cancel.cancel();
        if let Err(e) = active.handle.await {
            error!(job_id, "Polling task ended abnormally: {}", e);
        }

        record_status(self.jobs.as_ref(), job_id, JobStatus::Completed).await;
        info!(job_id, "Stopped polling job");
        true
    }

    async fn status(&self, job_id: &str) -> Result<Option<PollingJob>, OrchestratorError> {
        Ok(self.jobs.get_job(job_id).await?)
    }

    async fn list(&self) -> Result<Vec<PollingJob>, OrchestratorError> {
        let mut jobs = self.jobs.list_jobs().await?;
        jobs.sort_by_key(|job| job.created_at());
        Ok(jobs)
    }

    async fn active_count(&self) -> usize {
        self.active.len().await
    }

    async fn shutdown(&self) {
        info!("Shutting down job orchestrator...");
        self.shutdown.cancel();

        let active = self.active.drain().await;
        let count = active.len();
        for job in &active {
            job.cancel.cancel();
        }

        for result in join_all(active.into_iter().map(|job| job.handle)).await {
            if let Err(e) = result {
                error!("Polling task ended abnormally during shutdown: {}", e);
            }
        }

        info!("Job orchestrator shutdown complete ({} jobs stopped)", count);
    }
}

async fn drive_job(
    job: PollingJob,
    cancel: CancellationToken,
    polling: Arc<dyn PollingService>,
    jobs: Arc<dyn JobRepository>,
    active: Arc<ActiveJobs>,
) {
    let job_id = job.id().to_string();

    let outcome = AssertUnwindSafe(run_job(&job, &cancel, polling.as_ref(), jobs.as_ref()))
        .catch_unwind()
        .await;

    let final_status = match outcome {
        Ok(Ok(())) => JobStatus::Completed,
        Ok(Err(e)) => {
            error!(job_id = job_id.as_str(), "Fatal error in polling job: {}", e);
            JobStatus::Failed
        }
        Err(_) => {
            error!(job_id = job_id.as_str(), "Polling job panicked");
            JobStatus::Failed
        }
    };

    record_status(jobs.as_ref(), &job_id, final_status).await;
    active.take(&job_id).await;
}

async fn run_job(
    job: &PollingJob,
    cancel: &CancellationToken,
    polling: &dyn PollingService,
    jobs: &dyn JobRepository,
) -> Result<(), PollingError> {
    jobs.update_job_status(job.id(), JobStatus::Running).await?;
    polling.run(job, cancel).await
}

async fn record_status(jobs: &dyn JobRepository, job_id: &str, status: JobStatus) {
    match jobs.update_job_status(job_id, status).await {
        Ok(()) => {}
        Err(JobRepositoryError::TerminalState { current, .. }) => {
            warn!(job_id, "Job already {:?}, keeping it", current);
        }
        Err(e) => error!(job_id, "Error updating job status to {:?}: {}", status, e),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("Validation error: {0}")]
    Validation(#[from] JobValidationError),

    #[error("Job repository error: {0}")]
    Repository(#[from] JobRepositoryError),

    #[error("Orchestrator is shutting down")]
    ShuttingDown,
}
