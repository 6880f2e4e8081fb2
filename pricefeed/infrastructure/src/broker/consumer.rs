use async_trait::async_trait;
use once_cell::sync::OnceCell;
use pricefeed_application::ports::{Delivery, EventSource, SourceError};
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::Message;
use rdkafka::{Offset, TopicPartitionList};
use shaku::Component;
use std::time::Duration;
use tracing::{debug, info};

use super::config::KafkaSettings;

const SEEK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Component)]
#[shaku(interface = EventSource)]
pub struct KafkaEventSource {
    #[shaku(default = KafkaSettings::default())]
    settings: KafkaSettings,

    consumer: OnceCell<StreamConsumer>,
}

impl KafkaEventSource {
    pub fn new(settings: KafkaSettings) -> Self {
        Self {
            settings,
            consumer: OnceCell::new(),
        }
    }

    fn consumer(&self) -> Result<&StreamConsumer, SourceError> {
        self.consumer
            .get_or_try_init(|| {
                let consumer: StreamConsumer = self.settings.consumer_config().create()?;
                consumer.subscribe(&[self.settings.topic.as_str()])?;
                info!(
                    "Subscribed to {} as group {}",
                    self.settings.topic, self.settings.group_id
                );
                Ok(consumer)
            })
            .map_err(|e: KafkaError| SourceError::ClientUnavailable(e.to_string()))
    }
}

#[async_trait]
impl EventSource for KafkaEventSource {
    async fn poll(&self, timeout: Duration) -> Result<Option<Delivery>, SourceError> {
        let consumer = self.consumer()?;

        let message = match tokio::time::timeout(timeout, consumer.recv()).await {
            Err(_) => return Ok(None),
            Ok(received) => received.map_err(|e| SourceError::Receive(e.to_string()))?,
        };

        let delivery = Delivery {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            key: message
                .key()
                .map(|key| String::from_utf8_lossy(key).into_owned()),
            payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
        };
        debug!(
            "Received {}[{}]@{}",
            delivery.topic, delivery.partition, delivery.offset
        );
        Ok(Some(delivery))
    }

    async fn commit(&self, delivery: &Delivery) -> Result<(), SourceError> {
        let consumer = self.consumer()?;

        let mut offsets = TopicPartitionList::new();
        offsets
            .add_partition_offset(
                &delivery.topic,
                delivery.partition,
                Offset::Offset(delivery.offset + 1),
            )
            .map_err(|e| SourceError::Commit(e.to_string()))?;

        consumer
            .commit(&offsets, CommitMode::Async)
            .map_err(|e| SourceError::Commit(e.to_string()))
    }

    async fn rewind(&self, delivery: &Delivery) -> Result<(), SourceError> {
        let consumer = self.consumer()?;
        consumer
            .seek(
                &delivery.topic,
                delivery.partition,
                Offset::Offset(delivery.offset),
                SEEK_TIMEOUT,
            )
            .map_err(|e| SourceError::Seek(e.to_string()))
    }

    async fn close(&self) {
        if let Some(consumer) = self.consumer.get() {
            consumer.unsubscribe();
            info!("Kafka consumer closed");
        }
    }
}
