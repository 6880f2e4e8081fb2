use crate::moving_average_processor::{MovingAverageProcessor, ProcessError, ProcessOutcome};
use crate::ports::{Delivery, EventSource};
use async_trait::async_trait;
use shaku::{Component, Interface};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumerReport {
    pub received: usize,
    pub stored: usize,
    pub skipped: usize,
    pub malformed: usize,
    pub failed: usize,
}

#[async_trait]
pub trait EventConsumer: Interface {
    /// Consumes until `cancel` fires, then closes the source.
    async fn run(&self, cancel: CancellationToken) -> ConsumerReport;
}

#[derive(Component)]
#[shaku(interface = EventConsumer)]
pub struct EventConsumerImpl {
    #[shaku(inject)]
    source: Arc<dyn EventSource>,

    #[shaku(inject)]
    processor: Arc<dyn MovingAverageProcessor>,

    #[shaku(default = Duration::from_secs(1))]
    poll_timeout: Duration,

    #[shaku(default = Duration::from_secs(1))]
    failure_backoff: Duration,
}

impl EventConsumerImpl {
    pub fn new(
        source: Arc<dyn EventSource>,
        processor: Arc<dyn MovingAverageProcessor>,
        poll_timeout: Duration,
        failure_backoff: Duration,
    ) -> Self {
        Self {
            source,
            processor,
            poll_timeout,
            failure_backoff,
        }
    }

    async fn handle_delivery(&self, delivery: &Delivery, report: &mut ConsumerReport) {
        report.received += 1;

        match self.processor.process_payload(&delivery.payload).await {
            Ok(outcome) => {
                match outcome {
                    ProcessOutcome::Stored(_) => report.stored += 1,
                    ProcessOutcome::InsufficientData { .. }
                    | ProcessOutcome::ObservationMissing { .. }
                    | ProcessOutcome::Overflow { .. } => report.skipped += 1,
                }
                if let Err(e) = self.source.commit(delivery).await {
                    warn!(
                        "Commit failed for {}[{}]@{}: {}",
                        delivery.topic, delivery.partition, delivery.offset, e
                    );
                }
            }
            Err(ProcessError::Malformed(e)) => {
                report.malformed += 1;
                warn!(
                    "Skipping malformed message {}[{}]@{}: {}",
                    delivery.topic, delivery.partition, delivery.offset, e
                );
            }
            Err(e @ ProcessError::Persistence(_)) => {
                report.failed += 1;
                error!(
                    "Failed to process {}[{}]@{}, will be redelivered: {}",
                    delivery.topic, delivery.partition, delivery.offset, e
                );
                if let Err(e) = self.source.rewind(delivery).await {
                    error!("Rewind failed: {}", e);
                }
            }
        }
    }
}

#[async_trait]
impl EventConsumer for EventConsumerImpl {
    async fn run(&self, cancel: CancellationToken) -> ConsumerReport {
        info!("Started consuming price events");
        let mut report = ConsumerReport::default();

        loop {
            let polled = tokio::select! {
                _ = cancel.cancelled() => break,
                polled = self.source.poll(self.poll_timeout) => polled,
            };

            let backoff = match polled {
                Ok(None) => continue,
                Ok(Some(delivery)) => {
                    let failures = report.failed;
                    self.handle_delivery(&delivery, &mut report).await;
                    report.failed > failures
                }
                Err(e) => {
                    error!("Consumer error: {}", e);
                    true
                }
            };

            if backoff {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.failure_backoff) => {}
                }
            }
        }

        self.source.close().await;
        debug!("Consumer report: {:?}", report);
        info!("Price event consumer stopped");
        report
    }
}
