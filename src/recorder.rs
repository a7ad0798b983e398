// src/recorder.rs
//
// Non-blocking handoff of completed cycle records to the persistence
// collaborator. The scheduler pushes into a bounded queue and moves on;
// a slow or missing sink costs history, never scheduling.

use crate::error::ControlError;
use crate::types::CycleRecord;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct CycleRecorder {
    tx: mpsc::Sender<CycleRecord>,
    dropped: Arc<AtomicU64>,
}

impl CycleRecorder {
    pub fn new(queue_capacity: usize) -> (Self, mpsc::Receiver<CycleRecord>) {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let recorder = Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (recorder, rx)
    }

    /// Fire-and-forget. A full or closed queue drops the record with a
    /// warning and bumps the drop counter.
    pub fn record(&self, record: CycleRecord) {
        if let Err(err) = self.tx.try_send(record) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            warn!("{}", ControlError::SinkUnavailable(err.to_string()));
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Drains the record queue into an append-only JSON-lines file, one
/// record per line with the stable persisted field names. Runs until
/// every sender is gone.
pub async fn run_jsonl_sink(mut rx: mpsc::Receiver<CycleRecord>, path: PathBuf) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create sink directory {}", parent.display()))?;
        }
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await
        .with_context(|| format!("Failed to open record sink {}", path.display()))?;
    info!("record sink writing to {}", path.display());

    let mut written = 0u64;
    while let Some(record) = rx.recv().await {
        let mut line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(err) => {
                warn!("failed to serialize cycle record: {err}");
                continue;
            }
        };
        line.push('\n');
        if let Err(err) = file.write_all(line.as_bytes()).await {
            warn!("record write failed: {err}");
            continue;
        }
        if let Err(err) = file.flush().await {
            warn!("record flush failed: {err}");
        }
        written += 1;
    }
    info!("record sink closed after {written} record(s)");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SignalMode;
    use chrono::Utc;

    fn record(lane_id: u8) -> CycleRecord {
        CycleRecord {
            lane_id,
            vehicle_count: 7,
            duration_seconds: 29.0,
            mode: SignalMode::Normal,
            start_time: Utc::now(),
            end_time: Utc::now(),
        }
    }

    #[test]
    fn test_drop_when_queue_full() {
        let (recorder, _rx) = CycleRecorder::new(1);
        recorder.record(record(1));
        recorder.record(record(2));
        assert_eq!(recorder.dropped(), 1);
    }

    #[test]
    fn test_drop_when_sink_gone() {
        let (recorder, rx) = CycleRecorder::new(4);
        drop(rx);
        recorder.record(record(1));
        assert_eq!(recorder.dropped(), 1);
    }

    #[tokio::test]
    async fn test_jsonl_sink_writes_records() {
        let path = std::env::temp_dir().join(format!("cycle-sink-test-{}.jsonl", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let (recorder, rx) = CycleRecorder::new(8);
        let sink = tokio::spawn(run_jsonl_sink(rx, path.clone()));
        recorder.record(record(1));
        recorder.record(record(2));
        drop(recorder);
        sink.await.unwrap().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lanes: Vec<u8> = contents
            .lines()
            .map(|line| serde_json::from_str::<CycleRecord>(line).unwrap().lane_id)
            .collect();
        assert_eq!(lanes, vec![1, 2]);
        let _ = std::fs::remove_file(&path);
    }
}
