//! # Pulse Common Library
//!
//! Shared code for the Pulse sonification engine:
//! - Session configuration (`PulseConfig`) and transport settings
//! - Event types (`PulseEvent` enum) and the broadcast `EventBus`
//! - Playback parameter model produced by mapping scripts
//! - Error types

pub mod config;
pub mod error;
pub mod events;
pub mod params;

pub use config::{PulseConfig, ResourceId, TransportConfig};
pub use error::{Error, Result};
pub use params::PlaybackParams;
