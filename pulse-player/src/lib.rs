//! # Pulse Player Library (pulse-player)
//!
//! Core sonification engine: ingest events from a transport, map each event
//! to playback parameters through a user-supplied script, and fire samples.
//!
//! **Architecture:** One ingestion task per session feeding a single pipeline
//! task (sequential script evaluation), detached sample firing through a
//! per-style playback queue.
//!
//! Data flow: `EventSource` → raw event → `MappingScript::evaluate` →
//! `PlaybackParams` → `SoundBank::play`.

pub mod runner;
pub mod script;
pub mod sound;
pub mod source;

pub use pulse_common::error::{Error, Result};
pub use runner::{PulseRunner, SessionState};
