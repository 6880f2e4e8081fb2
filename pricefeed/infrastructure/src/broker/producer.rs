use async_trait::async_trait;
use once_cell::sync::OnceCell;
use pricefeed_application::ports::{EventPublisher, PublishError};
use pricefeed_domain::PriceEvent;
use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use shaku::Component;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::config::KafkaSettings;

const ENQUEUE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Component)]
#[shaku(interface = EventPublisher)]
pub struct KafkaEventPublisher {
    #[shaku(default = KafkaSettings::default())]
    settings: KafkaSettings,

    producer: OnceCell<FutureProducer>,
}

impl KafkaEventPublisher {
    pub fn new(settings: KafkaSettings) -> Self {
        Self {
            settings,
            producer: OnceCell::new(),
        }
    }

    fn producer(&self) -> Result<&FutureProducer, PublishError> {
        self.producer
            .get_or_try_init(|| {
                info!(
                    "Creating Kafka producer for {} (topic {})",
                    self.settings.bootstrap_servers, self.settings.topic
                );
                self.settings.producer_config().create()
            })
            .map_err(|e: KafkaError| PublishError::ClientUnavailable(e.to_string()))
    }
}

#[async_trait]
impl EventPublisher for KafkaEventPublisher {
    async fn publish(&self, event: &PriceEvent) -> Result<(), PublishError> {
        let payload = event.to_json()?;
        let producer = self.producer()?;

        let attempts = self.settings.publish_attempts.max(1);
        let mut backoff = Duration::from_millis(self.settings.retry_backoff_ms);
        let mut attempt = 1;

        loop {
            let record = FutureRecord::to(&self.settings.topic)
                .payload(&payload)
                .key(event.partition_key());

            match producer.send(record, ENQUEUE_TIMEOUT).await {
                Ok(_) => {
                    debug!(
                        "Price event for {} delivered to {}",
                        event.symbol, self.settings.topic
                    );
                    return Ok(());
                }
                Err((e, _)) if attempt < attempts => {
                    warn!(
                        "Publish attempt {}/{} for {} failed: {}. Retrying in {:?}",
                        attempt, attempts, event.symbol, e, backoff
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err((e, _)) => {
                    return Err(PublishError::DeliveryFailed {
                        symbol: event.symbol.clone(),
                        attempts,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    async fn flush(&self, timeout: Duration) -> usize {
        let Some(producer) = self.producer.get() else {
            return 0;
        };

        let producer = producer.clone();
        let flushed = tokio::task::spawn_blocking(move || {
            let result = producer.flush(Timeout::After(timeout));
            (result, producer.in_flight_count())
        })
        .await;

        match flushed {
            Ok((Ok(()), remaining)) => {
                info!("Kafka producer flushed");
                remaining.max(0) as usize
            }
            Ok((Err(e), remaining)) => {
                warn!("Kafka flush incomplete, {} messages in flight: {}", remaining, e);
                remaining.max(0) as usize
            }
            Err(e) => {
                warn!("Kafka flush task failed: {}", e);
                0
            }
        }
    }
}
