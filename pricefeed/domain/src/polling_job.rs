use crate::provider::{Provider, UnknownProvider};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub type JobId = String;

pub const MIN_SYMBOLS: usize = 1;
pub const MAX_SYMBOLS: usize = 10;
pub const MIN_INTERVAL_SECS: u64 = 30;
pub const MAX_INTERVAL_SECS: u64 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Accepted,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Accepted => "accepted",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "accepted" => Some(JobStatus::Accepted),
            "running" => Some(JobStatus::Running),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Writing the current status again is allowed and is a no-op for callers.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        if *self == next {
            return true;
        }
        match self {
            JobStatus::Accepted => true,
            JobStatus::Running => next.is_terminal(),
            JobStatus::Completed | JobStatus::Failed => false,
        }
    }
}

/// Persisted record of a polling job. The record outlives the task that runs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingJob {
    id: JobId,
    symbols: Vec<String>,
    interval_secs: u64,
    provider: Provider,
    status: JobStatus,
    created_at: DateTime<Utc>,
}

impl PollingJob {
    /// Validates a polling request and builds an `accepted` job record.
    pub fn new(
        id: JobId,
        symbols: Vec<String>,
        interval_secs: u64,
        provider: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Self, JobValidationError> {
        let symbols = normalize_symbols(symbols)?;

        if !(MIN_INTERVAL_SECS..=MAX_INTERVAL_SECS).contains(&interval_secs) {
            return Err(JobValidationError::IntervalOutOfRange(interval_secs));
        }

        let provider = provider.parse::<Provider>()?;

        Ok(Self {
            id,
            symbols,
            interval_secs,
            provider,
            status: JobStatus::Accepted,
            created_at,
        })
    }

    /// Rebuilds a record read back from storage, without re-running request validation.
    pub fn restore(
        id: JobId,
        symbols: Vec<String>,
        interval_secs: u64,
        provider: Provider,
        status: JobStatus,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            symbols,
            interval_secs,
            provider,
            status,
            created_at,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn interval_secs(&self) -> u64 {
        self.interval_secs
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = status;
        self
    }
}

fn normalize_symbols(symbols: Vec<String>) -> Result<Vec<String>, JobValidationError> {
    let mut normalized: Vec<String> = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let symbol = symbol.trim().to_string();
        if symbol.is_empty() {
            return Err(JobValidationError::EmptySymbol);
        }
        if !normalized.contains(&symbol) {
            normalized.push(symbol);
        }
    }

    match normalized.len() {
        0 => Err(JobValidationError::NoSymbols),
        n if n > MAX_SYMBOLS => Err(JobValidationError::TooManySymbols(n)),
        _ => Ok(normalized),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobValidationError {
    #[error("At least one symbol must be provided")]
    NoSymbols,

    #[error("Maximum 10 symbols allowed per job, got {0}")]
    TooManySymbols(usize),

    #[error("Symbols cannot be empty")]
    EmptySymbol,

    #[error("Polling interval must be between 30 and 3600 seconds, got {0}")]
    IntervalOutOfRange(u64),

    #[error("Invalid provider: {0}")]
    UnknownProvider(#[from] UnknownProvider),

    #[error("Provider {0} is not registered")]
    ProviderNotRegistered(Provider),
}
