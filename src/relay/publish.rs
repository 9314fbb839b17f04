// ABOUTME: Publishes dirty aircraft records to the event sink on a fixed interval
// ABOUTME: Clears the dirty flag only after a successful publish of the same revision

use std::sync::Arc;
use std::time::{Duration, Instant};

use position_store::PositionStore;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};

use crate::sink::EventSink;

/// Counters for one publish tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishStats {
    /// Dirty entries found at the start of the tick
    pub attempted: usize,
    pub published: usize,
    /// Sink errors; those entries stay dirty
    pub failed: usize,
    /// Entries that could not be encoded
    pub skipped: usize,
    /// Entries removed or changed again before they were sent
    pub superseded: usize,
    pub duration_ms: u64,
}

impl PublishStats {
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }
}

pub struct PublishLoop {
    store: Arc<PositionStore>,
    sink: Arc<dyn EventSink>,
    interval: Duration,
}

impl PublishLoop {
    pub fn new(store: Arc<PositionStore>, sink: Arc<dyn EventSink>, interval: Duration) -> Self {
        Self {
            store,
            sink,
            interval,
        }
    }

    /// Send every dirty record once, one message per aircraft.
    ///
    /// The store lock is taken for the scan and again for each clear, never
    /// while the sink is called.
    pub async fn run_cycle(&self) -> PublishStats {
        let start = Instant::now();
        let mut stats = PublishStats::default();

        let dirty = self.store.dirty_entries();
        stats.attempted = dirty.len();

        for entry in dirty {
            // Purged or re-merged since the scan: a purged aircraft must not
            // be published, a re-merged one goes out with its newer revision.
            if !self.store.is_current(&entry.identity, entry.revision) {
                stats.superseded += 1;
                continue;
            }

            let body = match entry.record.to_json() {
                Ok(body) => body,
                Err(e) => {
                    tracing::error!(flight = %entry.identity, "Failed to encode record: {}", e);
                    stats.skipped += 1;
                    continue;
                }
            };

            match self.sink.publish(&body).await {
                Ok(()) => {
                    if self.store.mark_published(&entry.identity, entry.revision) {
                        stats.published += 1;
                    } else {
                        // Changed while in flight; stays dirty for the next tick.
                        stats.superseded += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(flight = %entry.identity, "Publish failed, will retry: {}", e);
                    stats.failed += 1;
                }
            }
        }

        stats.duration_ms = start.elapsed().as_millis() as u64;
        stats
    }

    /// Publish on every tick until a shutdown signal arrives.
    ///
    /// A tick already sending finishes before the signal is observed.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            sink = %self.sink.describe(),
            interval = ?self.interval,
            "Starting publish loop"
        );

        loop {
            tokio::select! {
                biased; // Check shutdown first

                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, stopping publish loop");
                    break;
                }
                _ = ticker.tick() => {
                    let stats = self.run_cycle().await;
                    if stats.attempted == 0 {
                        continue;
                    }
                    if stats.is_success() {
                        tracing::debug!(
                            "Published {}/{} aircraft in {}ms",
                            stats.published,
                            stats.attempted,
                            stats.duration_ms
                        );
                    } else {
                        tracing::warn!(
                            published = stats.published,
                            failed = stats.failed,
                            skipped = stats.skipped,
                            superseded = stats.superseded,
                            "Publish tick incomplete after {}ms",
                            stats.duration_ms
                        );
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_stats_success() {
        let stats = PublishStats {
            attempted: 3,
            published: 2,
            superseded: 1,
            ..Default::default()
        };
        assert!(stats.is_success());
    }

    #[test]
    fn test_publish_stats_with_failures() {
        let stats = PublishStats {
            attempted: 3,
            published: 2,
            failed: 1,
            ..Default::default()
        };
        assert!(!stats.is_success());
    }
}
