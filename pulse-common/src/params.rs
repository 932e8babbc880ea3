//! Playback parameters produced by mapping scripts
//!
//! One `PlaybackParams` value is the result of evaluating the mapping script
//! against a single event. `sample == None` means "no audible effect for this
//! event" and is a perfectly normal outcome, not an error.

use serde::{Deserialize, Serialize};

/// Lowest playback rate the mixer accepts
pub const PITCH_MIN: f64 = 0.5;
/// Highest playback rate the mixer accepts
pub const PITCH_MAX: f64 = 2.0;
/// Gain range accepted by the mixer
pub const VOLUME_MIN: f64 = 0.0;
pub const VOLUME_MAX: f64 = 1.0;

/// Parameters for triggering one sample
///
/// Fields the script leaves out fall back to the neutral defaults
/// independently; a partial result object is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackParams {
    /// Logical sample name to trigger (None = silent event)
    pub sample: Option<String>,

    /// Playback rate, 1.0 = original pitch
    pub pitch: f64,

    /// Gain, 0.0-1.0
    pub volume: f64,

    /// Optional note length hint in milliseconds
    pub duration_ms: Option<i64>,
}

impl Default for PlaybackParams {
    fn default() -> Self {
        Self {
            sample: None,
            pitch: 1.0,
            volume: 1.0,
            duration_ms: None,
        }
    }
}

impl PlaybackParams {
    /// The neutral result used whenever script evaluation fails
    pub fn silent() -> Self {
        Self::default()
    }

    /// True if this result should trigger a sample
    pub fn is_audible(&self) -> bool {
        self.sample.is_some()
    }

    /// Clamp pitch and volume into the ranges the mixer accepts
    ///
    /// Scripts are expected to clamp by convention; the runner applies this
    /// once more before anything reaches audio hardware.
    pub fn clamped(mut self) -> Self {
        if !self.pitch.is_finite() {
            self.pitch = 1.0;
        }
        if !self.volume.is_finite() {
            self.volume = 1.0;
        }
        self.pitch = self.pitch.clamp(PITCH_MIN, PITCH_MAX);
        self.volume = self.volume.clamp(VOLUME_MIN, VOLUME_MAX);
        self
    }
}
