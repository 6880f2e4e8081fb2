#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use pricefeed_application::{
    Delivery, EventPublisher, EventSource, FetchError, FetchedPrice, JobRepository,
    JobRepositoryError, MovingAverageRepository, ObservationRepository, PriceFetcher,
    ProviderRegistry, PublishError, RateLimiter, RateLimiterError, RepositoryError, SourceError,
};
use pricefeed_domain::{JobStatus, MovingAverage, Observation, PollingJob, PriceEvent, Provider};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

pub fn ts(minute: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 25, 14, 0, 0).unwrap() + ChronoDuration::minutes(minute)
}

pub fn observation(id: &str, symbol: &str, price: Decimal, minute: i64) -> Observation {
    Observation::new(
        id.to_string(),
        symbol.to_string(),
        Provider::AlphaVantage,
        price,
        ts(minute),
    )
    .unwrap()
}

pub fn delivery(offset: i64, payload: Vec<u8>) -> Delivery {
    Delivery {
        topic: "price-events".to_string(),
        partition: 0,
        offset,
        key: None,
        payload,
    }
}

#[derive(Default)]
pub struct MemoryJobRepository {
    jobs: Mutex<HashMap<String, PollingJob>>,
}

impl MemoryJobRepository {
    pub fn len(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }
}

#[async_trait]
impl JobRepository for MemoryJobRepository {
    async fn save_job(&self, job: &PollingJob) -> Result<(), JobRepositoryError> {
        self.jobs
            .lock()
            .unwrap()
            .insert(job.id().to_string(), job.clone());
        Ok(())
    }

    async fn update_job_status(
        &self,
        job_id: &str,
        status: JobStatus,
    ) -> Result<(), JobRepositoryError> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| JobRepositoryError::NotFound(job_id.to_string()))?;
        if !job.status().can_transition_to(status) {
            return Err(JobRepositoryError::TerminalState {
                job_id: job_id.to_string(),
                current: job.status(),
                requested: status,
            });
        }
        *job = job.clone().with_status(status);
        Ok(())
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<PollingJob>, JobRepositoryError> {
        Ok(self.jobs.lock().unwrap().get(job_id).cloned())
    }

    async fn list_jobs(&self) -> Result<Vec<PollingJob>, JobRepositoryError> {
        Ok(self.jobs.lock().unwrap().values().cloned().collect())
    }
}

/// Holds every `save_job` until `release` is called. `saving` fires once a save is pending.
pub struct GatedJobRepository {
    inner: Arc<MemoryJobRepository>,
    pub saving: Notify,
    gate: Notify,
}

impl GatedJobRepository {
    pub fn new(inner: Arc<MemoryJobRepository>) -> Self {
        Self {
            inner,
            saving: Notify::new(),
            gate: Notify::new(),
        }
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl JobRepository for GatedJobRepository {
    async fn save_job(&self, job: &PollingJob) -> Result<(), JobRepositoryError> {
        self.saving.notify_one();
        self.gate.notified().await;
        self.inner.save_job(job).await
    }

    async fn update_job_status(
        &self,
        job_id: &str,
        status: JobStatus,
    ) -> Result<(), JobRepositoryError> {
        self.inner.update_job_status(job_id, status).await
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<PollingJob>, JobRepositoryError> {
        self.inner.get_job(job_id).await
    }

    async fn list_jobs(&self) -> Result<Vec<PollingJob>, JobRepositoryError> {
        self.inner.list_jobs().await
    }
}

/// Observations and moving averages in one place, like the shared store the services use.
#[derive(Default)]
pub struct MemoryPriceStore {
    observations: Mutex<Vec<(Observation, serde_json::Value)>>,
    averages: Mutex<HashMap<String, MovingAverage>>,
    upserts: AtomicUsize,
    failing_upserts: AtomicUsize,
}

impl MemoryPriceStore {
    pub fn with_observations(observations: Vec<Observation>) -> Self {
        let store = Self::default();
        store.observations.lock().unwrap().extend(
            observations
                .into_iter()
                .map(|observation| (observation, serde_json::Value::Null)),
        );
        store
    }

    pub fn add(&self, observation: Observation) {
        self.observations
            .lock()
            .unwrap()
            .push((observation, serde_json::Value::Null));
    }

    pub fn stored_observations(&self) -> Vec<Observation> {
        self.observations
            .lock()
            .unwrap()
            .iter()
            .map(|(observation, _)| observation.clone())
            .collect()
    }

    pub fn average_rows(&self) -> usize {
        self.averages.lock().unwrap().len()
    }

    pub fn average(&self, symbol: &str) -> Option<MovingAverage> {
        self.averages.lock().unwrap().get(symbol).cloned()
    }

    pub fn upserts(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    pub fn fail_next_upserts(&self, count: usize) {
        self.failing_upserts.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObservationRepository for MemoryPriceStore {
    async fn save_observation(
        &self,
        observation: &Observation,
        raw: &serde_json::Value,
    ) -> Result<(), RepositoryError> {
        self.observations
            .lock()
            .unwrap()
            .push((observation.clone(), raw.clone()));
        Ok(())
    }

    async fn get_observation(&self, id: &str) -> Result<Option<Observation>, RepositoryError> {
        Ok(self
            .observations
            .lock()
            .unwrap()
            .iter()
            .find(|(observation, _)| observation.id() == id)
            .map(|(observation, _)| observation.clone()))
    }

    async fn recent_observations(
        &self,
        symbol: &str,
        limit: usize,
    ) -> Result<Vec<Observation>, RepositoryError> {
        let mut matching: Vec<Observation> = self
            .observations
            .lock()
            .unwrap()
            .iter()
            .filter(|(observation, _)| observation.symbol() == symbol)
            .map(|(observation, _)| observation.clone())
            .collect();
        matching.sort_by_key(|observation| std::cmp::Reverse(observation.timestamp()));
        matching.truncate(limit);
        Ok(matching)
    }
}

#[async_trait]
impl MovingAverageRepository for MemoryPriceStore {
    async fn upsert_moving_average(&self, average: &MovingAverage) -> Result<(), RepositoryError> {
        let failing = self.failing_upserts.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_upserts.store(failing - 1, Ordering::SeqCst);
            return Err(RepositoryError::Backend("write rejected".to_string()));
        }
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.averages
            .lock()
            .unwrap()
            .insert(average.symbol().to_string(), average.clone());
        Ok(())
    }

    async fn get_moving_average(
        &self,
        symbol: &str,
    ) -> Result<Option<MovingAverage>, RepositoryError> {
        Ok(self.average(symbol))
    }
}

/// Returns a fixed price for every symbol except the ones configured to fail.
pub struct ScriptedFetcher {
    provider: Provider,
    price: Decimal,
    failing: HashSet<String>,
    calls: Mutex<Vec<(String, tokio::time::Instant)>>,
    sequence: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new(provider: Provider, price: Decimal) -> Self {
        Self {
            provider,
            price,
            failing: HashSet::new(),
            calls: Mutex::new(Vec::new()),
            sequence: AtomicUsize::new(0),
        }
    }

    pub fn failing_for(mut self, symbol: &str) -> Self {
        self.failing.insert(symbol.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(symbol, _)| symbol.clone())
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl PriceFetcher for ScriptedFetcher {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn fetch(&self, symbol: &str) -> Result<FetchedPrice, FetchError> {
        self.calls
            .lock()
            .unwrap()
            .push((symbol.to_string(), tokio::time::Instant::now()));

        if self.failing.contains(symbol) {
            return Err(FetchError::RequestFailed {
                provider: self.provider,
                reason: "HTTP 503".to_string(),
            });
        }

        let n = self.sequence.fetch_add(1, Ordering::SeqCst);
        let observation = Observation::new(
            format!("obs-{}", n),
            symbol.to_string(),
            self.provider,
            self.price,
            Utc::now(),
        )
        .map_err(|e| FetchError::InvalidResponse(e.to_string()))?;

        Ok(FetchedPrice {
            observation,
            raw: serde_json::json!({ "symbol": symbol, "price": self.price.to_string() }),
        })
    }
}

pub struct StubRegistry {
    fetchers: HashMap<Provider, Arc<dyn PriceFetcher>>,
}

impl StubRegistry {
    pub fn new(fetchers: Vec<Arc<dyn PriceFetcher>>) -> Self {
        Self {
            fetchers: fetchers
                .into_iter()
                .map(|fetcher| (fetcher.provider(), fetcher))
                .collect(),
        }
    }
}

impl ProviderRegistry for StubRegistry {
    fn fetcher(&self, provider: Provider) -> Option<Arc<dyn PriceFetcher>> {
        self.fetchers.get(&provider).cloned()
    }

    fn providers(&self) -> Vec<Provider> {
        self.fetchers.keys().copied().collect()
    }
}

pub struct NoopRateLimiter;

#[async_trait]
impl RateLimiter for NoopRateLimiter {
    async fn wait(&self, _provider: Provider) -> Result<Duration, RateLimiterError> {
        Ok(Duration::ZERO)
    }
}

pub struct BrokenRateLimiter;

#[async_trait]
impl RateLimiter for BrokenRateLimiter {
    async fn wait(&self, _provider: Provider) -> Result<Duration, RateLimiterError> {
        Err(RateLimiterError::Backend("connection refused".to_string()))
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<PriceEvent>>,
    failing: HashSet<String>,
}

impl RecordingPublisher {
    pub fn failing_for(symbol: &str) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            failing: HashSet::from([symbol.to_string()]),
        }
    }

    pub fn events(&self) -> Vec<PriceEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &PriceEvent) -> Result<(), PublishError> {
        if self.failing.contains(&event.symbol) {
            return Err(PublishError::DeliveryFailed {
                symbol: event.symbol.clone(),
                attempts: 3,
                reason: "broker transport failure".to_string(),
            });
        }
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn flush(&self, _timeout: Duration) -> usize {
        0
    }
}

/// Hands out queued deliveries and cancels `done` once the queue runs dry.
pub struct MemorySource {
    queue: Mutex<VecDeque<Delivery>>,
    commits: Mutex<Vec<i64>>,
    rewinds: Mutex<Vec<i64>>,
    closed: AtomicUsize,
    done: CancellationToken,
}

impl MemorySource {
    pub fn new(deliveries: Vec<Delivery>, done: CancellationToken) -> Self {
        Self {
            queue: Mutex::new(deliveries.into()),
            commits: Mutex::new(Vec::new()),
            rewinds: Mutex::new(Vec::new()),
            closed: AtomicUsize::new(0),
            done,
        }
    }

    pub fn commits(&self) -> Vec<i64> {
        self.commits.lock().unwrap().clone()
    }

    pub fn rewinds(&self) -> Vec<i64> {
        self.rewinds.lock().unwrap().clone()
    }

    pub fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventSource for MemorySource {
    async fn poll(&self, _timeout: Duration) -> Result<Option<Delivery>, SourceError> {
        let next = self.queue.lock().unwrap().pop_front();
        if next.is_none() {
            self.done.cancel();
        }
        Ok(next)
    }

    async fn commit(&self, delivery: &Delivery) -> Result<(), SourceError> {
        self.commits.lock().unwrap().push(delivery.offset);
        Ok(())
    }

    async fn rewind(&self, delivery: &Delivery) -> Result<(), SourceError> {
        self.rewinds.lock().unwrap().push(delivery.offset);
        self.queue.lock().unwrap().push_front(delivery.clone());
        Ok(())
    }

    async fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}
