//! Event sources
//!
//! Every transport is driven the same way: the runner spawns `run` as one
//! dedicated task, hands it the sending half of the session's event channel
//! and a cancellation token, and consumes events sequentially on the other
//! side. A source ends in one of three ways:
//!
//! - `Ok(())` after the token is cancelled (requested stop)
//! - `Ok(())` when the source is naturally finite (file replayed to the end)
//! - `Err(Transport)` on a connect/subscribe/stream failure
//!
//! Dropping the receiving half also ends a source; senders treat a closed
//! channel as a stop request. Cancellation is observed at poll return,
//! pre-sleep and pre-note, so `stop()` interrupts blocked pacing promptly.

#[cfg(feature = "kafka")]
pub mod kafka;
pub mod random;
pub mod replay;
pub mod rhythmic;
pub mod websocket;

use pulse_common::config::TransportConfig;
use pulse_common::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One raw unit from a source, not yet interpreted
#[derive(Debug, Clone)]
pub struct RawEvent {
    /// Unmodified payload text; interpreted only by the mapping script
    pub payload: String,

    /// Pitch forced by the source, replacing whatever the script computes
    ///
    /// Only the rhythmic generator sets this, for its per-note ramp.
    pub pitch_override: Option<f64>,
}

impl RawEvent {
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            pitch_override: None,
        }
    }

    pub fn with_pitch(payload: impl Into<String>, pitch: f64) -> Self {
        Self {
            payload: payload.into(),
            pitch_override: Some(pitch),
        }
    }
}

/// A configured transport, ready to run its ingestion loop
pub enum EventSource {
    #[cfg(feature = "kafka")]
    Kafka(kafka::KafkaSource),
    WebSocket(websocket::WebSocketSource),
    FileReplay(replay::ReplaySource),
    Random(random::RandomSource),
    Rhythmic(rhythmic::RhythmicSource),
}

impl EventSource {
    /// Build the source for a transport configuration
    pub fn from_config(transport: &TransportConfig) -> Result<Self> {
        match transport {
            #[cfg(feature = "kafka")]
            TransportConfig::Kafka {
                bootstrap_servers,
                topic,
                api_key,
                api_secret,
            } => Ok(EventSource::Kafka(kafka::KafkaSource::new(
                bootstrap_servers.clone(),
                topic.clone(),
                api_key.clone(),
                api_secret.clone(),
            ))),
            #[cfg(not(feature = "kafka"))]
            TransportConfig::Kafka { .. } => Err(pulse_common::Error::Config(
                "kafka transport selected but this build has no kafka support".to_string(),
            )),
            TransportConfig::WebSocket {
                url,
                subscribe_payload,
            } => Ok(EventSource::WebSocket(websocket::WebSocketSource::new(
                url.clone(),
                subscribe_payload.clone(),
            ))),
            TransportConfig::FileReplay {
                path,
                format,
                timestamp_field,
            } => Ok(EventSource::FileReplay(replay::ReplaySource::new(
                path.clone(),
                *format,
                timestamp_field.clone(),
            ))),
            TransportConfig::Random {
                delay_min_ms,
                delay_span_ms,
            } => Ok(EventSource::Random(random::RandomSource::new(
                *delay_min_ms,
                *delay_span_ms,
            ))),
            TransportConfig::Rhythmic => Ok(EventSource::Rhythmic(rhythmic::RhythmicSource::new())),
        }
    }

    /// Short transport name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            #[cfg(feature = "kafka")]
            EventSource::Kafka(_) => "kafka",
            EventSource::WebSocket(_) => "web_socket",
            EventSource::FileReplay(_) => "file_replay",
            EventSource::Random(_) => "random",
            EventSource::Rhythmic(_) => "rhythmic",
        }
    }

    /// Run the ingestion loop until cancellation, natural end or failure
    pub async fn run(self, tx: mpsc::Sender<RawEvent>, cancel: CancellationToken) -> Result<()> {
        match self {
            #[cfg(feature = "kafka")]
            EventSource::Kafka(source) => source.run(tx, cancel).await,
            EventSource::WebSocket(source) => source.run(tx, cancel).await,
            EventSource::FileReplay(source) => source.run(tx, cancel).await,
            EventSource::Random(source) => source.run(tx, cancel).await,
            EventSource::Rhythmic(source) => source.run(tx, cancel).await,
        }
    }
}
