//! Session orchestration
//!
//! A session is the runtime pairing of one event source, one mapping script
//! and one sound bank. `PulseRunner` owns the currently active session and
//! enforces the process-wide invariant that at most one session runs at a
//! time: starting a new session first drives any previous one all the way to
//! Stopped, so listeners always observe `SessionStopped(old)` strictly before
//! `SessionStarted(new)`.
//!
//! Per session the runner spawns two tasks:
//!
//! - the **source task**, running the transport's ingestion loop
//! - the **pipeline task**, the single consumer of the event channel; it is
//!   the only caller of `MappingScript::evaluate`, which keeps the script's
//!   persistent scope single-threaded
//!
//! Explicit stop requests, source self-termination (file exhausted, socket
//! closed) and transport failures all converge on the pipeline task's
//! teardown tail, which runs exactly once per session.

use crate::script::MappingScript;
use crate::sound::SoundBank;
use crate::source::{EventSource, RawEvent};
use chrono::Utc;
use pulse_common::config::{PulseConfig, ResourceId};
use pulse_common::events::{EventBus, PulseEvent};
use pulse_common::Result;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Sentinel stored while no session is active
const NO_SESSION: i64 = i64::MIN;

/// Depth of the source → pipeline event channel
const EVENT_QUEUE_DEPTH: usize = 64;

/// Observable session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[repr(u8)]
pub enum SessionState {
    Idle = 0,
    Loading = 1,
    Running = 2,
    Stopping = 3,
    Stopped = 4,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Idle,
            1 => SessionState::Loading,
            2 => SessionState::Running,
            3 => SessionState::Stopping,
            _ => SessionState::Stopped,
        }
    }
}

/// Orchestrates the single active session
pub struct PulseRunner {
    styles_root: PathBuf,
    bus: Arc<EventBus>,
    session: Mutex<Option<SessionHandle>>,
    active_id: Arc<AtomicI64>,
    state: Arc<AtomicU8>,
}

struct SessionHandle {
    resource_id: ResourceId,
    cancel: CancellationToken,
    /// Pipeline task; completion implies teardown finished and the session's
    /// `SessionStopped` was emitted
    done: JoinHandle<()>,
}

/// Everything the pipeline task owns for the lifetime of one session
struct ActiveSession {
    resource_id: ResourceId,
    rx: mpsc::Receiver<RawEvent>,
    script: MappingScript,
    bank: SoundBank,
    source_task: JoinHandle<Result<()>>,
    cancel: CancellationToken,
}

impl PulseRunner {
    /// Create a runner resolving acoustic styles under `styles_root`
    pub fn new(styles_root: impl Into<PathBuf>) -> Self {
        Self {
            styles_root: styles_root.into(),
            bus: Arc::new(EventBus::default()),
            session: Mutex::new(None),
            active_id: Arc::new(AtomicI64::new(NO_SESSION)),
            state: Arc::new(AtomicU8::new(SessionState::Idle as u8)),
        }
    }

    /// Subscribe to session lifecycle signals
    pub fn subscribe(&self) -> broadcast::Receiver<PulseEvent> {
        self.bus.subscribe()
    }

    /// The bus carrying `started` / `stopped` / `error` signals
    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    /// Resource id of the active session, if any; lock-free, safe to poll
    pub fn active_resource(&self) -> Option<ResourceId> {
        match self.active_id.load(Ordering::SeqCst) {
            NO_SESSION => None,
            id => Some(id),
        }
    }

    /// Current lifecycle phase; lock-free, safe to poll
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Start a session for `config`, stopping any previous session first
    ///
    /// An invalid configuration fails here with `Error::Config` and produces
    /// no signals and no session. Transport failures after this point are
    /// reported through the event bus instead.
    pub async fn start(&self, config: PulseConfig) -> Result<()> {
        if let Err(e) = config.validate() {
            warn!(
                resource_id = config.resource_id,
                "invalid session configuration: {e}"
            );
            self.mark_stopped_if_inactive();
            return Err(e);
        }
        let source = match EventSource::from_config(&config.transport) {
            Ok(source) => source,
            Err(e) => {
                warn!(resource_id = config.resource_id, "unusable transport: {e}");
                self.mark_stopped_if_inactive();
                return Err(e);
            }
        };

        let mut session = self.session.lock().await;

        // One-active-session invariant: the previous session must reach
        // Stopped (and emit its signal) before the new one starts loading
        if let Some(previous) = session.take() {
            info!(
                resource_id = previous.resource_id,
                "stopping previous session"
            );
            previous.cancel.cancel();
            if previous.done.await.is_err() {
                error!("previous session pipeline panicked");
            }
        }

        self.state
            .store(SessionState::Loading as u8, Ordering::SeqCst);
        info!(
            resource_id = config.resource_id,
            name = config.name.as_str(),
            transport = source.kind(),
            "starting session"
        );

        let mut bank = SoundBank::new(self.styles_root.clone());
        bank.load_style(
            &config.acoustic_style,
            &config.event_sounds,
            config.sounds_dir.as_deref(),
        );
        let script = match MappingScript::load(&config.script) {
            Ok(script) => script,
            Err(e) => {
                error!(resource_id = config.resource_id, "script engine failed: {e}");
                self.state
                    .store(SessionState::Stopped as u8, Ordering::SeqCst);
                return Err(e);
            }
        };

        let resource_id = config.resource_id;
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let source_task = tokio::spawn(source.run(tx, cancel.clone()));

        self.active_id.store(resource_id, Ordering::SeqCst);
        self.state
            .store(SessionState::Running as u8, Ordering::SeqCst);
        self.bus.emit_lossy(PulseEvent::SessionStarted {
            resource_id,
            timestamp: Utc::now(),
        });

        let active = ActiveSession {
            resource_id,
            rx,
            script,
            bank,
            source_task,
            cancel: cancel.clone(),
        };
        let done = tokio::spawn(Self::pipeline(
            active,
            Arc::clone(&self.bus),
            Arc::clone(&self.active_id),
            Arc::clone(&self.state),
        ));

        *session = Some(SessionHandle {
            resource_id,
            cancel,
            done,
        });
        Ok(())
    }

    /// A rejected start attempt ends Stopped, but must not clobber the state
    /// of a session that is still running
    fn mark_stopped_if_inactive(&self) {
        if self.active_resource().is_none() {
            self.state
                .store(SessionState::Stopped as u8, Ordering::SeqCst);
        }
    }

    /// Stop the active session and wait until it reaches Stopped; idempotent
    ///
    /// Safe to call from any task, and safe to race with the session's own
    /// self-termination: teardown runs at most once either way.
    pub async fn stop(&self) {
        let mut session = self.session.lock().await;
        if let Some(active) = session.take() {
            info!(resource_id = active.resource_id, "stop requested");
            active.cancel.cancel();
            if active.done.await.is_err() {
                error!("session pipeline panicked");
            }
        }
    }

    /// Single consumer of the session's event channel
    async fn pipeline(
        mut active: ActiveSession,
        bus: Arc<EventBus>,
        active_id: Arc<AtomicI64>,
        state: Arc<AtomicU8>,
    ) {
        loop {
            tokio::select! {
                _ = active.cancel.cancelled() => break,
                event = active.rx.recv() => match event {
                    Some(event) => Self::handle_event(&mut active.script, &active.bank, event),
                    None => break,
                }
            }
        }

        // Teardown tail: every way a session can end converges here, once
        state.store(SessionState::Stopping as u8, Ordering::SeqCst);
        active.cancel.cancel();
        drop(active.rx);
        let resource_id = active.resource_id;
        match active.source_task.await {
            Ok(Ok(())) => debug!(resource_id, "source ended"),
            Ok(Err(e)) => {
                warn!(resource_id, "transport failed: {e}");
                bus.emit_lossy(PulseEvent::TransportError {
                    resource_id,
                    message: e.to_string(),
                    timestamp: Utc::now(),
                });
            }
            Err(e) => {
                error!(resource_id, "source task aborted: {e}");
                bus.emit_lossy(PulseEvent::TransportError {
                    resource_id,
                    message: format!("source task aborted: {e}"),
                    timestamp: Utc::now(),
                });
            }
        }
        active.script.release();
        active.bank.release();

        let _ = active_id.compare_exchange(
            resource_id,
            NO_SESSION,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        state.store(SessionState::Stopped as u8, Ordering::SeqCst);
        bus.emit_lossy(PulseEvent::SessionStopped {
            resource_id,
            timestamp: Utc::now(),
        });
        info!(resource_id, "session stopped");
    }

    /// Evaluate one event and fire the resulting sample
    fn handle_event(script: &mut MappingScript, bank: &SoundBank, event: RawEvent) {
        let mut params = script.evaluate(&event.payload);
        if let Some(pitch) = event.pitch_override {
            params.pitch = pitch;
        }
        let params = params.clamped();
        if let Some(sample) = &params.sample {
            bank.play(sample, params.pitch, params.volume);
        }
    }
}
