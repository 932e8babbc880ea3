//! File replay ingestion
//!
//! Replays a finite recorded sequence from a JSON array or a CSV file.
//! Pacing: with a configured timestamp field, the delay before record *i* is
//! `ts[i] - ts[i-1]` milliseconds (never negative, zero when the field is
//! missing on either side); without one, records are spaced a fixed second
//! apart, first record immediate. Ends the session by itself after the last
//! record.

use super::RawEvent;
use pulse_common::config::ReplayFormat;
use pulse_common::{Error, Result};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Spacing used when no timestamp field is configured
const FIXED_DELAY: Duration = Duration::from_secs(1);

pub struct ReplaySource {
    path: PathBuf,
    format: Option<ReplayFormat>,
    timestamp_field: Option<String>,
}

impl ReplaySource {
    pub fn new(path: PathBuf, format: Option<ReplayFormat>, timestamp_field: Option<String>) -> Self {
        Self {
            path,
            format,
            timestamp_field,
        }
    }

    pub async fn run(self, tx: mpsc::Sender<RawEvent>, cancel: CancellationToken) -> Result<()> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            Error::Transport(format!("cannot read event file {}: {e}", self.path.display()))
        })?;

        let format = self
            .format
            .unwrap_or_else(|| ReplayFormat::detect(&self.path));
        let records = match format {
            ReplayFormat::Json => parse_json_records(&content)?,
            ReplayFormat::Csv => parse_csv_records(&content)?,
        };
        info!(
            path = %self.path.display(),
            records = records.len(),
            "replaying event file"
        );

        // CSV rows have no timestamp column; the field only applies to JSON
        let timestamp_field = match format {
            ReplayFormat::Json => self.timestamp_field.as_deref(),
            ReplayFormat::Csv => None,
        };
        let delays = inter_event_delays(&records, timestamp_field);

        for (record, delay) in records.iter().zip(delays) {
            if delay > Duration::ZERO {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => return Ok(()),
                }
            }
            if cancel.is_cancelled() {
                return Ok(());
            }
            if tx.send(RawEvent::new(record.to_string())).await.is_err() {
                return Ok(());
            }
        }
        debug!("event file exhausted");
        Ok(())
    }
}

fn parse_json_records(content: &str) -> Result<Vec<Value>> {
    let value: Value = serde_json::from_str(content)
        .map_err(|e| Error::Transport(format!("malformed JSON event file: {e}")))?;
    match value {
        Value::Array(records) => Ok(records),
        _ => Err(Error::Transport(
            "event file must contain a JSON array".to_string(),
        )),
    }
}

/// Each CSV row `event_type,amount` becomes `{"event_type":…,"amount":…}`;
/// rows with fewer than two fields are skipped
fn parse_csv_records(content: &str) -> Result<Vec<Value>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| Error::Transport(format!("malformed CSV event file: {e}")))?;
        let Some(event_type) = row.get(0).filter(|t| !t.is_empty()) else {
            continue;
        };
        if row.len() < 2 {
            continue;
        }
        let amount = row
            .get(1)
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(1.0);
        records.push(serde_json::json!({
            "event_type": event_type,
            "amount": amount,
        }));
    }
    Ok(records)
}

/// Compute the wait before each record
///
/// Pure so the pacing rules can be checked without a clock.
pub fn inter_event_delays(records: &[Value], timestamp_field: Option<&str>) -> Vec<Duration> {
    let Some(field) = timestamp_field else {
        return records
            .iter()
            .enumerate()
            .map(|(i, _)| if i == 0 { Duration::ZERO } else { FIXED_DELAY })
            .collect();
    };

    let mut delays = Vec::with_capacity(records.len());
    let mut last: Option<i64> = None;
    for record in records {
        let ts = record
            .get(field)
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)));
        let delay = match (last, ts) {
            (Some(prev), Some(cur)) if cur > prev => Duration::from_millis((cur - prev) as u64),
            _ => Duration::ZERO,
        };
        if ts.is_some() {
            last = ts;
        }
        delays.push(delay);
    }
    delays
}
