pub mod config;
pub mod consumer;
pub mod producer;

pub use config::KafkaSettings;
pub use consumer::{KafkaEventSource, KafkaEventSourceParameters};
pub use producer::{KafkaEventPublisher, KafkaEventPublisherParameters};
