// ABOUTME: Polls the aircraft.json snapshot and merges it into the position store
// ABOUTME: Skips unchanged files by modification time, then merges and purges once per snapshot

use std::sync::Arc;
use std::time::{Instant, SystemTime};

use chrono::{DateTime, Utc};
use position_store::{PositionStore, PurgeStats, Snapshot};
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};

use crate::config::RelayConfig;
use crate::error::{RelayError, Result};

/// Counters for one merged snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// When the receiver wrote the snapshot (`now`)
    pub captured_at: Option<DateTime<Utc>>,
    /// Receiver's running Mode S message counter
    pub messages: u64,
    /// Records in the snapshot
    pub received: usize,
    /// Records passing admission
    pub admitted: usize,
    /// Records dropped for an empty flight or unknown position
    pub skipped: usize,
    /// New or moved aircraft now awaiting publish
    pub changed: usize,
    pub purged: PurgeStats,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Modification time has not advanced since the last read.
    Unchanged,
    Merged(IngestStats),
}

pub struct IngestLoop {
    config: RelayConfig,
    store: Arc<PositionStore>,
    last_modified: Option<SystemTime>,
}

impl IngestLoop {
    pub fn new(config: RelayConfig, store: Arc<PositionStore>) -> Self {
        Self {
            config,
            store,
            last_modified: None,
        }
    }

    /// Check the snapshot once and merge it if it changed.
    ///
    /// A snapshot that fails to decode still advances the watermark, so it is
    /// not read again until the file is rewritten.
    pub async fn run_cycle(&mut self) -> Result<IngestOutcome> {
        let path = &self.config.snapshot_path;
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| RelayError::source_access(path, e))?;
        let modified = metadata
            .modified()
            .map_err(|e| RelayError::source_access(path, e))?;

        if matches!(self.last_modified, Some(seen) if modified <= seen) {
            return Ok(IngestOutcome::Unchanged);
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| RelayError::source_access(path, e))?;
        self.last_modified = Some(modified);

        let snapshot = Snapshot::from_slice(&bytes).map_err(|e| RelayError::decode(path, e))?;
        Ok(IngestOutcome::Merged(self.merge(snapshot)))
    }

    /// Normalize and upsert every record, then purge absent and stale aircraft.
    pub fn merge(&self, snapshot: Snapshot) -> IngestStats {
        let start = Instant::now();
        let mut stats = IngestStats {
            captured_at: snapshot.captured_at(),
            messages: snapshot.messages,
            ..IngestStats::default()
        };

        // Presence covers every flight in the file, admitted or not.
        let sightings = snapshot.sightings();
        let now = Utc::now();

        for mut record in snapshot.into_records() {
            stats.received += 1;
            record.normalize(&self.config.station, now);
            if !record.is_admissible() {
                stats.skipped += 1;
                continue;
            }
            stats.admitted += 1;
            if self.store.upsert(record) {
                stats.changed += 1;
            }
        }

        stats.purged = self.store.purge(&sightings, self.config.max_age);
        stats.duration_ms = start.elapsed().as_millis() as u64;
        stats
    }

    pub fn last_modified(&self) -> Option<SystemTime> {
        self.last_modified
    }

    /// Poll until a shutdown signal arrives. Cycle errors are logged and
    /// never end the loop.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = interval(self.config.ingest_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            path = %self.config.snapshot_path.display(),
            interval = ?self.config.ingest_interval,
            max_age = ?self.config.max_age,
            "Starting ingest loop"
        );

        loop {
            tokio::select! {
                biased; // Check shutdown first

                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, stopping ingest loop");
                    break;
                }
                _ = ticker.tick() => {
                    match self.run_cycle().await {
                        Ok(IngestOutcome::Unchanged) => {
                            tracing::trace!("snapshot unchanged");
                        }
                        Ok(IngestOutcome::Merged(stats)) => {
                            tracing::debug!(
                                captured_at = ?stats.captured_at,
                                messages = stats.messages,
                                received = stats.received,
                                admitted = stats.admitted,
                                skipped = stats.skipped,
                                changed = stats.changed,
                                purged = stats.purged.total(),
                                tracked = self.store.len(),
                                "Merged snapshot in {}ms",
                                stats.duration_ms
                            );
                            if stats.purged.total() > 0 {
                                tracing::info!(
                                    "Purged {} aircraft ({} absent, {} stale)",
                                    stats.purged.total(),
                                    stats.purged.absent,
                                    stats.purged.stale
                                );
                            }
                        }
                        Err(e) => {
                            tracing::warn!("Ingest cycle skipped: {}", e);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ingest() -> IngestLoop {
        IngestLoop::new(
            RelayConfig {
                station: "test".to_string(),
                max_age: Duration::from_secs(60),
                ..RelayConfig::default()
            },
            Arc::new(PositionStore::new()),
        )
    }

    #[test]
    fn merge_counts_admission_and_changes() {
        let ingest = ingest();
        let snapshot = Snapshot::from_slice(
            br#"{"now": 1700000000.5, "messages": 10, "aircraft": [
                {"flight": "UAL1  ", "lat": 47.5, "lon": -122.3, "alt_geom": 3000, "track": 90.0, "seen": 1.0},
                {"flight": "", "lat": 47.5, "lon": -122.3},
                {"flight": "NOPOS", "seen": 2.0},
                {"hex": "a1b2c3", "lat": 1.0, "lon": 2.0}
            ]}"#,
        )
        .unwrap();

        let stats = ingest.merge(snapshot);
        assert_eq!(stats.received, 4);
        assert_eq!(stats.admitted, 1);
        assert_eq!(stats.skipped, 3);
        assert_eq!(stats.changed, 1);
        assert_eq!(stats.purged.total(), 0);
        assert_eq!(stats.messages, 10);
        assert_eq!(
            stats.captured_at.map(|at| at.timestamp_millis()),
            Some(1_700_000_000_500)
        );

        let entry = ingest.store.get("UAL1").expect("trimmed identity stored");
        assert_eq!(entry.record.station, "test");
        assert!(entry.dirty);
    }

    #[test]
    fn merge_purges_previous_aircraft_missing_from_snapshot() {
        let ingest = ingest();
        let first = Snapshot::from_slice(
            br#"{"aircraft": [
                {"flight": "A", "lat": 1.0, "lon": 2.0},
                {"flight": "B", "lat": 1.0, "lon": 2.0}
            ]}"#,
        )
        .unwrap();
        ingest.merge(first);

        let second =
            Snapshot::from_slice(br#"{"aircraft": [{"flight": "A", "lat": 1.0, "lon": 2.0}]}"#)
                .unwrap();
        let stats = ingest.merge(second);

        assert_eq!(stats.changed, 0);
        assert_eq!(stats.purged.absent, 1);
        assert_eq!(stats.captured_at, None);
        assert_eq!(ingest.store.identities(), vec!["A".to_string()]);
    }
}
