//! Session configuration
//!
//! A `PulseConfig` is supplied fully resolved by the caller: resource records,
//! credential decryption and `${placeholder}` substitution all happen in the
//! persistence layer before a session is started. The core treats the value
//! as immutable for the lifetime of the session.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Row id of the configuration record in the external store
pub type ResourceId = i64;

/// Default lower bound for the random generator's inter-event delay
pub const RANDOM_DELAY_MIN_MS: u64 = 100;
/// Default span added on top of the lower bound (delays fall in [min, min+span))
pub const RANDOM_DELAY_SPAN_MS: u64 = 1900;

/// Immutable configuration for one session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PulseConfig {
    /// Identifier of the configuration record; also the session identity
    pub resource_id: ResourceId,

    /// Display name used in logs
    #[serde(default = "default_name")]
    pub name: String,

    /// Event transport to ingest from
    pub transport: TransportConfig,

    /// Ordered logical sound names the acoustic style must resolve
    #[serde(default)]
    pub event_sounds: Vec<String>,

    /// Named sample directory set used for resolution
    pub acoustic_style: String,

    /// Mapping script source text
    pub script: String,

    /// Session-specific sample override directory, searched before the style
    #[serde(default)]
    pub sounds_dir: Option<PathBuf>,
}

fn default_name() -> String {
    "Pulse".to_string()
}

/// Transport kind and connection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportConfig {
    /// Subscribe to one topic on one Kafka cluster
    Kafka {
        /// Comma-separated broker list
        bootstrap_servers: String,
        /// Topic to subscribe to
        topic: String,
        /// SASL PLAIN username, already decrypted
        #[serde(default)]
        api_key: Option<String>,
        /// SASL PLAIN password, already decrypted
        #[serde(default)]
        api_secret: Option<String>,
    },

    /// Single WebSocket connection, optionally sending a subscribe payload
    WebSocket {
        /// ws:// or wss:// endpoint
        url: String,
        /// Text frame sent once after the connection opens
        #[serde(default)]
        subscribe_payload: Option<String>,
    },

    /// Replay a finite recorded event file
    FileReplay {
        /// Path to the JSON array or CSV file
        path: PathBuf,
        /// File format; detected from the extension when omitted
        #[serde(default)]
        format: Option<ReplayFormat>,
        /// Record field holding a millisecond timestamp used for pacing
        #[serde(default)]
        timestamp_field: Option<String>,
    },

    /// Continuous synthetic events with uniform random spacing
    Random {
        #[serde(default = "default_delay_min")]
        delay_min_ms: u64,
        #[serde(default = "default_delay_span")]
        delay_span_ms: u64,
    },

    /// Beat-quantized synthetic note bursts
    Rhythmic,
}

fn default_delay_min() -> u64 {
    RANDOM_DELAY_MIN_MS
}

fn default_delay_span() -> u64 {
    RANDOM_DELAY_SPAN_MS
}

impl TransportConfig {
    /// Short transport name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            TransportConfig::Kafka { .. } => "kafka",
            TransportConfig::WebSocket { .. } => "web_socket",
            TransportConfig::FileReplay { .. } => "file_replay",
            TransportConfig::Random { .. } => "random",
            TransportConfig::Rhythmic => "rhythmic",
        }
    }
}

/// Recorded event file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayFormat {
    Json,
    Csv,
}

impl ReplayFormat {
    /// Detect the format from the file extension; anything but `.csv` is JSON
    pub fn detect(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => ReplayFormat::Csv,
            _ => ReplayFormat::Json,
        }
    }
}

impl PulseConfig {
    /// Load a session configuration from a TOML file
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        let config: PulseConfig = toml::from_str(&text)
            .map_err(|e| Error::Config(format!("invalid config file {}: {e}", path.display())))?;
        config.validate()?;
        tracing::debug!(
            resource_id = config.resource_id,
            transport = config.transport.kind(),
            "session configuration loaded"
        );
        Ok(config)
    }

    /// Check that every field the selected transport requires is present
    ///
    /// A failure here is fatal to session start and produces no side effects.
    pub fn validate(&self) -> Result<()> {
        if self.script.trim().is_empty() {
            return Err(Error::Config("mapping script is empty".to_string()));
        }
        if self.acoustic_style.trim().is_empty() {
            return Err(Error::Config("acoustic_style is empty".to_string()));
        }
        match &self.transport {
            TransportConfig::Kafka {
                bootstrap_servers,
                topic,
                ..
            } => {
                if bootstrap_servers.trim().is_empty() {
                    return Err(Error::Config("kafka bootstrap_servers is empty".to_string()));
                }
                if topic.trim().is_empty() {
                    return Err(Error::Config("kafka topic is empty".to_string()));
                }
            }
            TransportConfig::WebSocket { url, .. } => {
                if url.trim().is_empty() {
                    return Err(Error::Config("web_socket url is empty".to_string()));
                }
                if !(url.starts_with("ws://") || url.starts_with("wss://")) {
                    return Err(Error::Config(format!(
                        "web_socket url must start with ws:// or wss://, got {url}"
                    )));
                }
            }
            TransportConfig::FileReplay { path, .. } => {
                if path.as_os_str().is_empty() {
                    return Err(Error::Config("file_replay path is empty".to_string()));
                }
            }
            // span 0 degenerates to a fixed delay, which is fine
            TransportConfig::Random { .. } => {}
            TransportConfig::Rhythmic => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn base_config(transport: TransportConfig) -> PulseConfig {
        PulseConfig {
            resource_id: 1,
            name: "test".to_string(),
            transport,
            event_sounds: vec!["kick".to_string()],
            acoustic_style: "percussion".to_string(),
            script: "#{}".to_string(),
            sounds_dir: None,
        }
    }

    #[test]
    fn test_validate_accepts_complete_configs() {
        let ws = base_config(TransportConfig::WebSocket {
            url: "wss://example.com/feed".to_string(),
            subscribe_payload: None,
        });
        assert!(ws.validate().is_ok());

        let kafka = base_config(TransportConfig::Kafka {
            bootstrap_servers: "broker:9092".to_string(),
            topic: "events".to_string(),
            api_key: None,
            api_secret: None,
        });
        assert!(kafka.validate().is_ok());

        let rhythmic = base_config(TransportConfig::Rhythmic);
        assert!(rhythmic.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_fields() {
        let mut config = base_config(TransportConfig::WebSocket {
            url: String::new(),
            subscribe_payload: None,
        });
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config = base_config(TransportConfig::WebSocket {
            url: "http://not-a-socket".to_string(),
            subscribe_payload: None,
        });
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config = base_config(TransportConfig::Kafka {
            bootstrap_servers: "broker:9092".to_string(),
            topic: "  ".to_string(),
            api_key: None,
            api_secret: None,
        });
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config = base_config(TransportConfig::Rhythmic);
        config.script = String::new();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_replay_format_detection() {
        assert_eq!(
            ReplayFormat::detect(Path::new("events.CSV")),
            ReplayFormat::Csv
        );
        assert_eq!(
            ReplayFormat::detect(Path::new("events.json")),
            ReplayFormat::Json
        );
        assert_eq!(ReplayFormat::detect(Path::new("events")), ReplayFormat::Json);
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r##"
resource_id = 42
name = "market data"
event_sounds = ["kick", "snare"]
acoustic_style = "percussion"
script = "#{{ sample: \"kick\" }}"

[transport]
kind = "web_socket"
url = "wss://stream.example.com/ws"
subscribe_payload = '{{"method":"SUBSCRIBE"}}'
"##
        )
        .unwrap();

        let config = PulseConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(config.resource_id, 42);
        assert_eq!(config.event_sounds.len(), 2);
        match &config.transport {
            TransportConfig::WebSocket { url, subscribe_payload } => {
                assert_eq!(url, "wss://stream.example.com/ws");
                assert!(subscribe_payload.is_some());
            }
            other => panic!("wrong transport: {other:?}"),
        }
    }

    #[test]
    fn test_from_toml_file_rejects_incomplete() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
resource_id = 1
acoustic_style = "percussion"
script = ""

[transport]
kind = "rhythmic"
"#
        )
        .unwrap();
        assert!(matches!(
            PulseConfig::from_toml_file(file.path()),
            Err(Error::Config(_))
        ));
    }
}
