//! Kafka ingestion
//!
//! One consumer, one topic, polled in a bounded-timeout loop on a blocking
//! thread. Cancellation is checked at every poll return, so a stop request is
//! honored within one poll timeout. Setup and mid-stream failures end the
//! session; there is no retry.

use super::RawEvent;
use pulse_common::{Error, Result};
use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::message::Message;
use rdkafka::ClientConfig;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Consumer group shared by all sessions of this process
const GROUP_ID: &str = "pulse-player";
/// Upper bound on how long a single poll may block
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

pub struct KafkaSource {
    bootstrap_servers: String,
    topic: String,
    api_key: Option<String>,
    api_secret: Option<String>,
}

impl KafkaSource {
    pub fn new(
        bootstrap_servers: String,
        topic: String,
        api_key: Option<String>,
        api_secret: Option<String>,
    ) -> Self {
        Self {
            bootstrap_servers,
            topic,
            api_key,
            api_secret,
        }
    }

    pub async fn run(self, tx: mpsc::Sender<RawEvent>, cancel: CancellationToken) -> Result<()> {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.bootstrap_servers)
            .set("group.id", GROUP_ID)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "latest")
            .set("enable.partition.eof", "false");

        if let (Some(key), Some(secret)) = (&self.api_key, &self.api_secret) {
            config
                .set("security.protocol", "SASL_SSL")
                .set("sasl.mechanisms", "PLAIN")
                .set("sasl.username", key)
                .set("sasl.password", secret);
        }

        let consumer: BaseConsumer = config
            .create()
            .map_err(|e| Error::Transport(format!("failed to create Kafka consumer: {e}")))?;
        consumer
            .subscribe(&[&self.topic])
            .map_err(|e| Error::Transport(format!("failed to subscribe to {}: {e}", self.topic)))?;
        info!(topic = self.topic.as_str(), "Kafka consumer subscribed");

        let topic = self.topic;
        let result = tokio::task::spawn_blocking(move || {
            while !cancel.is_cancelled() {
                match consumer.poll(POLL_TIMEOUT) {
                    None => continue,
                    Some(Err(e)) => {
                        return Err(Error::Transport(format!(
                            "Kafka consumer error on {topic}: {e}"
                        )));
                    }
                    Some(Ok(message)) => {
                        let payload = match message.payload_view::<str>() {
                            Some(Ok(text)) => text,
                            Some(Err(_)) => {
                                warn!(topic = topic.as_str(), "dropping non-UTF-8 message");
                                continue;
                            }
                            None => continue,
                        };
                        if tx.blocking_send(RawEvent::new(payload)).is_err() {
                            break;
                        }
                    }
                }
            }
            debug!(topic = topic.as_str(), "Kafka poll loop ended");
            Ok(())
        })
        .await
        .map_err(|e| Error::Internal(format!("Kafka poll thread failed: {e}")))?;

        result
    }
}
