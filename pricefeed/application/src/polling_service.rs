use crate::job_state::JobRepositoryError;
use crate::ports::{EventPublisher, FetchError, PriceFetcher, ProviderRegistry, PublishError};
use crate::price_store::{ObservationRepository, RepositoryError};
use crate::rate_limiter::{RateLimiter, RateLimiterError};
use async_trait::async_trait;
use chrono::Utc;
use pricefeed_domain::{JobValidationError, PollingJob, PriceEvent, Provider};
use shaku::{Component, Interface};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A polling request as received from the outer layer, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollingRequest {
    pub symbols: Vec<String>,
    pub interval_secs: u64,
    pub provider: String,
}

impl PollingRequest {
    pub fn new(symbols: Vec<String>, interval_secs: u64, provider: impl Into<String>) -> Self {
        Self {
            symbols,
            interval_secs,
            provider: provider.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    pub published: usize,
    /// Symbols skipped this cycle with the reason.
    pub skipped: Vec<(String, String)>,
    pub cancelled: bool,
}

#[async_trait]
pub trait PollingService: Interface {
    fn validate(&self, request: &PollingRequest) -> Result<PollingJob, JobValidationError>;

    /// One sequential pass over the job's symbols.
    async fn poll_once(
        &self,
        job: &PollingJob,
        cancel: &CancellationToken,
    ) -> Result<PollReport, PollingError>;

    /// Repeats `poll_once` every interval until `cancel` fires.
    async fn run(&self, job: &PollingJob, cancel: &CancellationToken) -> Result<(), PollingError>;
}

#[derive(Component)]
#[shaku(interface = PollingService)]
pub struct PollingServiceImpl {
    #[shaku(inject)]
    registry: Arc<dyn ProviderRegistry>,

    #[shaku(inject)]
    rate_limiter: Arc<dyn RateLimiter>,

    #[shaku(inject)]
    observations: Arc<dyn ObservationRepository>,

    #[shaku(inject)]
    publisher: Arc<dyn EventPublisher>,
}

impl PollingServiceImpl {
    pub fn new(
        registry: Arc<dyn ProviderRegistry>,
        rate_limiter: Arc<dyn RateLimiter>,
        observations: Arc<dyn ObservationRepository>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            registry,
            rate_limiter,
            observations,
            publisher,
        }
    }

    async fn poll_symbol(
        &self,
        job: &PollingJob,
        symbol: &str,
        fetcher: &dyn PriceFetcher,
        cancel: &CancellationToken,
    ) -> Result<SymbolPoll, SymbolError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(SymbolPoll::Cancelled),
            waited = self.rate_limiter.wait(job.provider()) => {
                let delay = waited?;
                if !delay.is_zero() {
                    debug!("Rate limited {} for {:?} before {}", job.provider(), delay, symbol);
                }
            }
        }

        let fetched = fetcher.fetch(symbol).await?;

        self.observations
            .save_observation(&fetched.observation, &fetched.raw)
            .await?;

        let event = PriceEvent::from_observation(&fetched.observation);
        self.publisher.publish(&event).await?;

        info!(
            job_id = job.id(),
            "Polled {} from {}: {}",
            symbol,
            job.provider(),
            event.price
        );
        Ok(SymbolPoll::Published)
    }
}

#[async_trait]
impl PollingService for PollingServiceImpl {
    fn validate(&self, request: &PollingRequest) -> Result<PollingJob, JobValidationError> {
        let job = PollingJob::new(
            Uuid::new_v4().to_string(),
            request.symbols.clone(),
            request.interval_secs,
            &request.provider,
            Utc::now(),
        )?;

        if !self.registry.is_registered(job.provider()) {
            return Err(JobValidationError::ProviderNotRegistered(job.provider()));
        }

        Ok(job)
    }

    async fn poll_once(
        &self,
        job: &PollingJob,
        cancel: &CancellationToken,
    ) -> Result<PollReport, PollingError> {
        let fetcher = self
            .registry
            .fetcher(job.provider())
            .ok_or(PollingError::ProviderUnavailable(job.provider()))?;

        debug!(
            job_id = job.id(),
            "Polling {} symbols with provider {}",
            job.symbols().len(),
            job.provider()
        );

        let mut report = PollReport::default();
        for symbol in job.symbols() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            match self.poll_symbol(job, symbol, fetcher.as_ref(), cancel).await {
                Ok(SymbolPoll::Published) => report.published += 1,
                Ok(SymbolPoll::Cancelled) => {
                    report.cancelled = true;
                    break;
                }
                Err(e) => match e.disposition() {
                    Disposition::SkipSymbol => {
                        warn!(job_id = job.id(), "Skipping {} this cycle: {}", symbol, e);
                        report.skipped.push((symbol.clone(), e.to_string()));
                    }
                    Disposition::FailJob => return Err(PollingError::Symbol(e)),
                },
            }
        }

        Ok(report)
    }

    async fn run(&self, job: &PollingJob, cancel: &CancellationToken) -> Result<(), PollingError> {
        info!(
            job_id = job.id(),
            "Polling {:?} every {}s via {}",
            job.symbols(),
            job.interval_secs(),
            job.provider()
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let report = self.poll_once(job, cancel).await?;
            debug!(
                job_id = job.id(),
                "Cycle finished: {} published, {} skipped",
                report.published,
                report.skipped.len()
            );
            if report.cancelled {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(job.interval()) => {}
            }
        }

        info!(job_id = job.id(), "Polling loop cancelled");
        Ok(())
    }
}

enum SymbolPoll {
    Published,
    Cancelled,
}

/// What a symbol failure means for the job that hit it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    SkipSymbol,
    FailJob,
}

#[derive(Debug, thiserror::Error)]
pub enum SymbolError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Observation not stored: {0}")]
    Persistence(#[from] RepositoryError),

    #[error("Publish failed: {0}")]
    Publish(#[from] PublishError),

    #[error("Rate limiter failed: {0}")]
    RateLimit(#[from] RateLimiterError),
}

impl SymbolError {
    pub fn disposition(&self) -> Disposition {
        match self {
            SymbolError::Fetch(_) | SymbolError::Persistence(_) | SymbolError::Publish(_) => {
                Disposition::SkipSymbol
            }
            SymbolError::RateLimit(_) => Disposition::FailJob,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PollingError {
    #[error("No fetcher registered for provider {0}")]
    ProviderUnavailable(Provider),

    #[error(transparent)]
    Symbol(SymbolError),

    #[error("Job state error: {0}")]
    JobState(#[from] JobRepositoryError),
}
