//! Event system for Pulse
//!
//! Provides the `PulseEvent` session signals and the `EventBus` used to
//! broadcast them to external listeners (CLI, status displays, tests).
//!
//! # Architecture
//!
//! - **EventBus** (tokio::broadcast): one-to-many session signal broadcasting
//! - Emission is non-blocking and lossy by design: a session must never stall
//!   because nobody is listening
//!
//! Exactly one `SessionStopped` is emitted per session. `TransportError` is
//! emitted only for transport-layer failures; script errors never reach the
//! bus.

use crate::config::ResourceId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Default bus capacity used by the runner
pub const DEFAULT_BUS_CAPACITY: usize = 100;

/// Session lifecycle signals observable from outside the core
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PulseEvent {
    /// A session finished loading and its ingestion loop is running
    SessionStarted {
        /// Resource id of the session's configuration record
        resource_id: ResourceId,
        /// When the session entered Running
        timestamp: DateTime<Utc>,
    },

    /// A session reached Stopped; emitted exactly once per session
    SessionStopped {
        /// Resource id of the session's configuration record
        resource_id: ResourceId,
        /// When teardown completed
        timestamp: DateTime<Utc>,
    },

    /// The session's transport failed (connect, subscribe or mid-stream)
    ///
    /// Always followed by the session's `SessionStopped`.
    TransportError {
        /// Resource id of the session's configuration record
        resource_id: ResourceId,
        /// Human-readable failure description
        message: String,
        /// When the failure was observed
        timestamp: DateTime<Utc>,
    },
}

impl PulseEvent {
    /// Resource id the signal refers to
    pub fn resource_id(&self) -> ResourceId {
        match self {
            PulseEvent::SessionStarted { resource_id, .. }
            | PulseEvent::SessionStopped { resource_id, .. }
            | PulseEvent::TransportError { resource_id, .. } => *resource_id,
        }
    }

    /// Stable name of the event variant, as used in serialized form
    pub fn event_type(&self) -> &'static str {
        match self {
            PulseEvent::SessionStarted { .. } => "SessionStarted",
            PulseEvent::SessionStopped { .. } => "SessionStopped",
            PulseEvent::TransportError { .. } => "TransportError",
        }
    }
}

/// Broadcast bus for `PulseEvent`
pub struct EventBus {
    tx: broadcast::Sender<PulseEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<PulseEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` otherwise.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: PulseEvent,
    ) -> std::result::Result<usize, broadcast::error::SendError<PulseEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the absence of subscribers
    pub fn emit_lossy(&self, event: PulseEvent) {
        let _ = self.tx.send(event);
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}
