use rdkafka::config::ClientConfig;
use serde::Deserialize;
use std::time::Duration;

/// Broker connection and client tuning shared by the publisher and the event source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct KafkaSettings {
    pub bootstrap_servers: String,
    pub topic: String,
    pub client_id: String,
    pub group_id: String,

    pub security_protocol: String,
    pub sasl_mechanism: Option<String>,
    pub sasl_username: Option<String>,
    pub sasl_password: Option<String>,

    pub acks: String,
    pub retries: u32,
    pub retry_backoff_ms: u64,
    pub compression_type: String,
    pub batch_size: u32,
    pub linger_ms: u64,
    pub message_timeout_ms: u64,
    /// Attempts made by the publisher on top of the client's own retries.
    pub publish_attempts: u32,

    pub poll_timeout_ms: u64,
    pub session_timeout_ms: u64,
    pub heartbeat_interval_ms: u64,
}

impl Default for KafkaSettings {
    fn default() -> Self {
        Self {
            bootstrap_servers: "localhost:9092".to_string(),
            topic: "price-events".to_string(),
            client_id: "market-data-producer".to_string(),
            group_id: "moving-average-consumer".to_string(),
            security_protocol: "PLAINTEXT".to_string(),
            sasl_mechanism: None,
            sasl_username: None,
            sasl_password: None,
            acks: "all".to_string(),
            retries: 3,
            retry_backoff_ms: 1000,
            compression_type: "snappy".to_string(),
            batch_size: 16384,
            linger_ms: 10,
            message_timeout_ms: 30000,
            publish_attempts: 3,
            poll_timeout_ms: 1000,
            session_timeout_ms: 30000,
            heartbeat_interval_ms: 3000,
        }
    }
}

impl KafkaSettings {
    pub fn producer_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.bootstrap_servers)
            .set("client.id", &self.client_id)
            .set("acks", &self.acks)
            .set("retries", self.retries.to_string())
            .set("retry.backoff.ms", self.retry_backoff_ms.to_string())
            .set("compression.type", &self.compression_type)
            .set("batch.size", self.batch_size.to_string())
            .set("linger.ms", self.linger_ms.to_string())
            .set("message.timeout.ms", self.message_timeout_ms.to_string());
        self.apply_security(&mut config);
        config
    }

    pub fn consumer_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.bootstrap_servers)
            .set("group.id", &self.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", self.session_timeout_ms.to_string())
            .set("heartbeat.interval.ms", self.heartbeat_interval_ms.to_string());
        self.apply_security(&mut config);
        config
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn message_timeout(&self) -> Duration {
        Duration::from_millis(self.message_timeout_ms)
    }

    fn apply_security(&self, config: &mut ClientConfig) {
        if self.security_protocol.eq_ignore_ascii_case("PLAINTEXT") {
            return;
        }

        config.set("security.protocol", &self.security_protocol);
        let sasl = [
            ("sasl.mechanism", &self.sasl_mechanism),
            ("sasl.username", &self.sasl_username),
            ("sasl.password", &self.sasl_password),
        ];
        for (key, value) in sasl {
            if let Some(value) = value {
                config.set(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn producer_config_carries_delivery_guarantees() {
        let config = KafkaSettings::default().producer_config();

        assert_eq!(config.get("bootstrap.servers"), Some("localhost:9092"));
        assert_eq!(config.get("client.id"), Some("market-data-producer"));
        assert_eq!(config.get("acks"), Some("all"));
        assert_eq!(config.get("retries"), Some("3"));
        assert_eq!(config.get("retry.backoff.ms"), Some("1000"));
        assert_eq!(config.get("compression.type"), Some("snappy"));
        assert_eq!(config.get("batch.size"), Some("16384"));
        assert_eq!(config.get("linger.ms"), Some("10"));
        assert_eq!(config.get("security.protocol"), None);
    }

    #[test]
    fn consumer_config_disables_auto_commit() {
        let config = KafkaSettings::default().consumer_config();

        assert_eq!(config.get("group.id"), Some("moving-average-consumer"));
        assert_eq!(config.get("enable.auto.commit"), Some("false"));
        assert_eq!(config.get("auto.offset.reset"), Some("earliest"));
        assert_eq!(config.get("session.timeout.ms"), Some("30000"));
        assert_eq!(config.get("heartbeat.interval.ms"), Some("3000"));
    }

    #[test]
    fn sasl_is_applied_outside_plaintext() {
        let settings = KafkaSettings {
            security_protocol: "SASL_SSL".to_string(),
            sasl_mechanism: Some("PLAIN".to_string()),
            sasl_username: Some("svc".to_string()),
            sasl_password: Some("secret".to_string()),
            ..KafkaSettings::default()
        };

        for config in [settings.producer_config(), settings.consumer_config()] {
            assert_eq!(config.get("security.protocol"), Some("SASL_SSL"));
            assert_eq!(config.get("sasl.mechanism"), Some("PLAIN"));
            assert_eq!(config.get("sasl.username"), Some("svc"));
            assert_eq!(config.get("sasl.password"), Some("secret"));
        }
    }

    #[test]
    fn partial_settings_fall_back_to_defaults() {
        let settings: KafkaSettings =
            serde_json::from_str(r#"{ "bootstrap_servers": "broker:29092" }"#).unwrap();

        assert_eq!(settings.bootstrap_servers, "broker:29092");
        assert_eq!(settings.topic, "price-events");
        assert_eq!(settings.poll_timeout(), Duration::from_secs(1));
    }
}
