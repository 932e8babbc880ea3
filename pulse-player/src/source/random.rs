//! Random synthetic generator
//!
//! Emits a minimal timestamp/entropy event forever with a uniform random gap
//! between emissions. The payload carries no meaning of its own; all behavior
//! comes from the mapping script.

use super::RawEvent;
use pulse_common::Result;
use rand::Rng;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct RandomSource {
    delay_min_ms: u64,
    delay_span_ms: u64,
}

impl RandomSource {
    pub fn new(delay_min_ms: u64, delay_span_ms: u64) -> Self {
        Self {
            delay_min_ms,
            delay_span_ms,
        }
    }

    fn next_delay(&self) -> Duration {
        let jitter = if self.delay_span_ms > 0 {
            rand::thread_rng().gen_range(0..self.delay_span_ms)
        } else {
            0
        };
        Duration::from_millis(self.delay_min_ms + jitter)
    }

    pub async fn run(self, tx: mpsc::Sender<RawEvent>, cancel: CancellationToken) -> Result<()> {
        debug!(
            min_ms = self.delay_min_ms,
            span_ms = self.delay_span_ms,
            "random generator running"
        );
        while !cancel.is_cancelled() {
            let payload = serde_json::json!({
                "timestamp": chrono::Utc::now().timestamp_millis(),
                "entropy": rand::thread_rng().gen::<f64>(),
            })
            .to_string();
            if tx.send(RawEvent::new(payload)).await.is_err() {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.next_delay()) => {}
                _ = cancel.cancelled() => break,
            }
        }
        Ok(())
    }
}
