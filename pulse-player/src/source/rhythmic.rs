//! Beat-quantized rhythmic generator
//!
//! Unlike the random generator, note timing here is governed by a fixed beat
//! grid: quarter note = 500ms (120 BPM), and a burst may only begin on beat 1
//! or beat 3 of a 4/4 measure (global beat index ≡ 0 or 2 mod 4). Each burst
//! picks a pattern whose notes total exactly one or two beats, so the grid
//! stays aligned, and a pitch ramp direction applied on top of the script's
//! result.
//!
//! Rescheduling after a burst starts from the *current* wall-clock time. A
//! burst that overran its slot therefore drifts to the next allowed beat
//! instead of trying to catch up with missed measures.

use super::RawEvent;
use pulse_common::Result;
use rand::Rng;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Quarter-note length: 120 BPM
pub const BASE_TEMPO: Duration = Duration::from_millis(500);
/// Pitch distance between consecutive notes of a burst
pub const PITCH_STEP: f64 = 0.15;

/// One burst shape: `notes` evenly spaced notes, `beats_per_note` beats each
#[derive(Debug, Clone, Copy)]
pub struct BurstPattern {
    pub notes: u32,
    pub beats_per_note: f64,
}

impl BurstPattern {
    /// Total grid time the burst occupies, in beats
    pub fn total_beats(&self) -> f64 {
        self.notes as f64 * self.beats_per_note
    }

    /// Wall-clock length of one note at the base tempo
    pub fn note_duration(&self) -> Duration {
        BASE_TEMPO.mul_f64(self.beats_per_note)
    }
}

/// Fixed pattern inventory; every entry totals exactly 1 or 2 beats
pub const PATTERNS: &[BurstPattern] = &[
    BurstPattern { notes: 4, beats_per_note: 0.25 },
    BurstPattern { notes: 2, beats_per_note: 1.0 },
    BurstPattern { notes: 3, beats_per_note: 1.0 / 3.0 },
    BurstPattern { notes: 6, beats_per_note: 1.0 / 6.0 },
    BurstPattern { notes: 8, beats_per_note: 0.125 },
    BurstPattern { notes: 1, beats_per_note: 2.0 },
    BurstPattern { notes: 1, beats_per_note: 1.0 },
    BurstPattern { notes: 2, beats_per_note: 0.5 },
];

/// Smallest beat index >= `beat` on which a burst may begin (index ≡ 0 or 2
/// mod 4: beats 1 and 3 of the measure)
pub fn next_burst_beat(beat: u64) -> u64 {
    let mut target = beat;
    while target % 4 != 0 && target % 4 != 2 {
        target += 1;
    }
    target
}

/// Pitch of note `index` on a ramp in `direction` (+1.0 or -1.0)
pub fn ramp_pitch(index: u32, direction: f64) -> f64 {
    (1.0 + index as f64 * PITCH_STEP * direction).clamp(0.5, 2.0)
}

pub struct RhythmicSource;

impl RhythmicSource {
    pub fn new() -> Self {
        Self
    }

    pub async fn run(self, tx: mpsc::Sender<RawEvent>, cancel: CancellationToken) -> Result<()> {
        let session_start = Instant::now();
        debug!("rhythmic generator running");

        while !cancel.is_cancelled() {
            let elapsed_ms = session_start.elapsed().as_millis() as u64;
            let current_beat = elapsed_ms / BASE_TEMPO.as_millis() as u64;
            let target_beat = next_burst_beat(current_beat);
            let target =
                session_start + Duration::from_millis(target_beat * BASE_TEMPO.as_millis() as u64);

            let now = Instant::now();
            if target > now {
                tokio::select! {
                    _ = tokio::time::sleep(target - now) => {}
                    _ = cancel.cancelled() => break,
                }
            }
            if cancel.is_cancelled() {
                break;
            }

            let pattern = PATTERNS[rand::thread_rng().gen_range(0..PATTERNS.len())];
            let direction = if rand::thread_rng().gen_bool(0.5) { 1.0 } else { -1.0 };
            trace!(
                beat = target_beat,
                notes = pattern.notes,
                direction,
                "burst start"
            );

            if !self.play_burst(&tx, &cancel, pattern, direction).await {
                break;
            }
        }
        Ok(())
    }

    /// Emit one burst; returns false when the session is ending
    async fn play_burst(
        &self,
        tx: &mpsc::Sender<RawEvent>,
        cancel: &CancellationToken,
        pattern: BurstPattern,
        direction: f64,
    ) -> bool {
        let note_duration = pattern.note_duration();
        for index in 0..pattern.notes {
            if cancel.is_cancelled() {
                return false;
            }
            let event = RawEvent::with_pitch(r#"{"type":"rhythmic"}"#, ramp_pitch(index, direction));
            if tx.send(event).await.is_err() {
                return false;
            }
            tokio::select! {
                _ = tokio::time::sleep(note_duration) => {}
                _ = cancel.cancelled() => return false,
            }
        }
        true
    }
}

impl Default for RhythmicSource {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_burst_beats_are_always_on_one_or_three() {
        let mut rng = rand::thread_rng();
        // Simulate 1000 scheduling iterations from arbitrary points in time
        for _ in 0..1000 {
            let elapsed_ms: u64 = rng.gen_range(0..3_600_000);
            let current_beat = elapsed_ms / BASE_TEMPO.as_millis() as u64;
            let target = next_burst_beat(current_beat);
            assert!(target >= current_beat);
            assert!(
                target % 4 == 0 || target % 4 == 2,
                "beat {target} is not beat 1 or 3 of a measure"
            );
            // Never skips an allowed beat
            assert!(target - current_beat <= 1);
        }
    }

    #[test]
    fn test_every_pattern_totals_one_or_two_beats() {
        for pattern in PATTERNS {
            let total = pattern.total_beats();
            assert!(
                (total - 1.0).abs() < 1e-9 || (total - 2.0).abs() < 1e-9,
                "pattern {pattern:?} totals {total} beats"
            );
        }
    }

    #[test]
    fn test_ramp_pitch_is_clamped_to_mixer_range() {
        assert_eq!(ramp_pitch(0, 1.0), 1.0);
        assert!((ramp_pitch(1, 1.0) - 1.15).abs() < 1e-12);
        assert!((ramp_pitch(2, -1.0) - 0.7).abs() < 1e-12);
        // Long ascending and descending runs saturate at the bounds
        assert_eq!(ramp_pitch(7, 1.0), 2.0);
        assert_eq!(ramp_pitch(7, -1.0), 0.5);
    }

    #[test]
    fn test_note_durations_follow_the_tempo() {
        let triplet = BurstPattern {
            notes: 3,
            beats_per_note: 1.0 / 3.0,
        };
        let one_note = triplet.note_duration();
        assert!(one_note > Duration::from_millis(166) && one_note < Duration::from_millis(167));
        let half = BurstPattern {
            notes: 1,
            beats_per_note: 2.0,
        };
        assert_eq!(half.note_duration(), Duration::from_millis(1000));
    }
}
