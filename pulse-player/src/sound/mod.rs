//! Sound bank: sample resolution, decoding and fire-and-forget playback
//!
//! `load_style` resolves each required logical sound name to a sample file,
//! decodes it once, and hands the decoded set to a dedicated playback thread.
//! `play` posts onto that thread's queue and returns immediately, so loading
//! and unloading can never race with in-flight triggers from the ingestion
//! side. Overlapping plays mix freely up to [`MAX_VOICES`]; beyond that the
//! oldest voice is stolen.
//!
//! Resolution misses and decode failures are warnings, not errors: a renamed
//! sample must never take down a live session.

pub mod matcher;

use rodio::source::Buffered;
use rodio::{Decoder, OutputStream, Sink, Source};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Concurrent voice limit enforced by the playback queue
pub const MAX_VOICES: usize = 10;

type CachedSample = Buffered<Decoder<BufReader<File>>>;

struct PlayCmd {
    sample: String,
    pitch: f32,
    volume: f32,
}

/// Resolves logical sample names and plays them through a per-style mixer
pub struct SoundBank {
    styles_root: PathBuf,
    queue: Option<(mpsc::Sender<PlayCmd>, JoinHandle<()>)>,
    resolved: Vec<String>,
}

impl SoundBank {
    /// Create a bank rooted at the directory containing style sample folders
    pub fn new(styles_root: impl Into<PathBuf>) -> Self {
        Self {
            styles_root: styles_root.into(),
            queue: None,
            resolved: Vec::new(),
        }
    }

    /// Resolve and decode the required sounds for one acoustic style
    ///
    /// Each name is tried against `override_dir` first, then against
    /// `<styles_root>/<style>/`. Names that resolve nowhere are skipped with
    /// a warning. Replaces any previously loaded style.
    pub fn load_style(&mut self, style: &str, required: &[String], override_dir: Option<&Path>) {
        self.release();
        info!(style, sounds = required.len(), "loading acoustic style");

        let style_dir = self.styles_root.join(style);
        let mut samples: HashMap<String, CachedSample> = HashMap::new();

        for name in required {
            let path = override_dir
                .and_then(|dir| resolve_in_dir(dir, name))
                .or_else(|| resolve_in_dir(&style_dir, name));

            let Some(path) = path else {
                warn!(
                    sound = name.as_str(),
                    style, "no sample file found for sound"
                );
                continue;
            };

            match decode_sample(&path) {
                Ok(sample) => {
                    debug!(sound = name.as_str(), path = %path.display(), "sample loaded");
                    samples.insert(name.clone(), sample);
                }
                Err(e) => {
                    warn!(sound = name.as_str(), path = %path.display(), "failed to decode sample: {e}");
                }
            }
        }

        self.resolved = {
            let mut names: Vec<String> = samples.keys().cloned().collect();
            names.sort();
            names
        };

        let (tx, rx) = mpsc::channel();
        let handle = std::thread::Builder::new()
            .name("pulse-playback".to_string())
            .spawn(move || playback_queue(samples, rx));
        match handle {
            Ok(handle) => self.queue = Some((tx, handle)),
            Err(e) => warn!("failed to start playback queue thread: {e}"),
        }
    }

    /// Logical names that resolved to a decodable sample, sorted
    pub fn resolved_samples(&self) -> &[String] {
        &self.resolved
    }

    /// Trigger one sample; fire-and-forget
    ///
    /// A no-op with a warning when the bank is not loaded or the name did not
    /// resolve. Never an error.
    pub fn play(&self, sample: &str, pitch: f64, volume: f64) {
        let Some((tx, _)) = &self.queue else {
            warn!(sample, "cannot play: no style loaded");
            return;
        };
        let cmd = PlayCmd {
            sample: sample.to_string(),
            pitch: pitch as f32,
            volume: volume as f32,
        };
        if tx.send(cmd).is_err() {
            warn!(sample, "cannot play: playback queue is gone");
        }
    }

    /// Stop the playback queue and drop the decoded samples; idempotent
    pub fn release(&mut self) {
        if let Some((tx, handle)) = self.queue.take() {
            drop(tx);
            if handle.join().is_err() {
                warn!("playback queue thread panicked during shutdown");
            }
        }
        self.resolved.clear();
    }
}

impl Drop for SoundBank {
    fn drop(&mut self) {
        self.release();
    }
}

/// Fuzzy-resolve `query` against the file names in `dir`
fn resolve_in_dir(dir: &Path, query: &str) -> Option<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return None,
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|e| e.file_name().into_string().ok())
        .collect();
    names.sort();
    matcher::find_match(names.iter().map(String::as_str), query).map(|name| dir.join(name))
}

fn decode_sample(path: &Path) -> Result<CachedSample, String> {
    let file = File::open(path).map_err(|e| e.to_string())?;
    let decoder = Decoder::new(BufReader::new(file)).map_err(|e| e.to_string())?;
    Ok(decoder.buffered())
}

/// Body of the per-style playback thread
///
/// Owns the audio output stream for the lifetime of the loaded style. When no
/// output device is available the queue degrades to a logging sink so the
/// ingestion side keeps working unchanged.
fn playback_queue(samples: HashMap<String, CachedSample>, rx: mpsc::Receiver<PlayCmd>) {
    let (_stream, handle) = match OutputStream::try_default() {
        Ok(pair) => pair,
        Err(e) => {
            warn!("no audio output device, playback disabled: {e}");
            while rx.recv().is_ok() {}
            return;
        }
    };

    let mut voices: Vec<Sink> = Vec::new();
    while let Ok(cmd) = rx.recv() {
        let Some(source) = samples.get(&cmd.sample) else {
            warn!(
                sample = cmd.sample.as_str(),
                loaded = samples.len(),
                "sample not loaded"
            );
            continue;
        };

        voices.retain(|v| !v.empty());
        if voices.len() >= MAX_VOICES {
            // steal the oldest voice, SoundPool style
            voices.remove(0);
        }

        match Sink::try_new(&handle) {
            Ok(sink) => {
                trace!(sample = cmd.sample.as_str(), pitch = cmd.pitch, volume = cmd.volume, "voice start");
                sink.set_speed(cmd.pitch);
                sink.set_volume(cmd.volume);
                sink.append(source.clone());
                voices.push(sink);
            }
            Err(e) => warn!("failed to open mixer voice: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..64i32 {
            writer.write_sample((i * 100) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_play_without_loaded_style_is_noop() {
        let bank = SoundBank::new("/nonexistent");
        bank.play("kick", 1.0, 1.0);
    }

    #[test]
    fn test_load_style_with_missing_directories() {
        let mut bank = SoundBank::new("/nonexistent");
        bank.load_style("percussion", &["kick".to_string()], None);
        assert!(bank.resolved_samples().is_empty());
        // Unresolved plays are no-ops and do not poison later calls
        bank.play("kick", 1.0, 0.5);
        bank.play("kick", 1.0, 0.5);
        bank.release();
    }

    #[test]
    fn test_load_style_resolves_fuzzily_and_prefers_override_dir() {
        let styles = tempfile::tempdir().unwrap();
        let style_dir = styles.path().join("percussion");
        std::fs::create_dir(&style_dir).unwrap();
        write_wav(&style_dir.join("Kick - Tekk.wav"));
        write_wav(&style_dir.join("snare_og.wav"));

        let override_dir = tempfile::tempdir().unwrap();
        write_wav(&override_dir.path().join("kick tekk custom.wav"));

        let mut bank = SoundBank::new(styles.path());
        bank.load_style(
            "percussion",
            &[
                "kick tekk".to_string(),
                "Snare OG".to_string(),
                "missing".to_string(),
            ],
            Some(override_dir.path()),
        );
        assert_eq!(
            bank.resolved_samples(),
            ["Snare OG".to_string(), "kick tekk".to_string()]
        );

        // Triggers are accepted whether or not an audio device exists
        bank.play("kick tekk", 1.5, 0.3);
        bank.play("missing", 1.0, 1.0);
        bank.release();
        bank.release();
    }

    #[test]
    fn test_reload_replaces_previous_style() {
        let styles = tempfile::tempdir().unwrap();
        let a = styles.path().join("a");
        let b = styles.path().join("b");
        std::fs::create_dir_all(&a).unwrap();
        std::fs::create_dir_all(&b).unwrap();
        write_wav(&a.join("kick.wav"));
        write_wav(&b.join("bell.wav"));

        let mut bank = SoundBank::new(styles.path());
        bank.load_style("a", &["kick".to_string()], None);
        assert_eq!(bank.resolved_samples(), ["kick".to_string()]);
        bank.load_style("b", &["bell".to_string()], None);
        assert_eq!(bank.resolved_samples(), ["bell".to_string()]);
    }
}
