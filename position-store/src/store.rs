use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::debug;

use crate::detector::has_moved;
use crate::record::{age_from_secs, TrackedObjectRecord};

/// A stored record plus its publish bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreEntry {
    pub record: TrackedObjectRecord,
    /// Changed since the last successful publish, or never published.
    pub dirty: bool,
    /// Store-wide sequence number of the last change to this entry.
    pub revision: u64,
}

/// A dirty record as seen by the publish path, tagged with the revision it was
/// read at.
#[derive(Debug, Clone, PartialEq)]
pub struct DirtyEntry {
    pub identity: String,
    pub revision: u64,
    pub record: TrackedObjectRecord,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeStats {
    pub absent: usize,
    pub stale: usize,
}

impl PurgeStats {
    pub fn total(&self) -> usize {
        self.absent + self.stale
    }
}

/// Identities present in one snapshot together with the seen age the source
/// reported for each.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sightings {
    ages: HashMap<String, f64>,
}

impl Sightings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sighting. Duplicate identities keep the freshest (smallest) age.
    pub fn insert(&mut self, identity: impl Into<String>, seen: f64) {
        let identity = identity.into();
        if identity.is_empty() {
            return;
        }
        self.ages
            .entry(identity)
            .and_modify(|age| {
                if seen < *age {
                    *age = seen;
                }
            })
            .or_insert(seen);
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.ages.contains_key(identity)
    }

    pub fn reported_age(&self, identity: &str) -> Option<Duration> {
        self.ages.get(identity).map(|secs| age_from_secs(*secs))
    }

    pub fn len(&self) -> usize {
        self.ages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ages.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for Sightings {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut sightings = Sightings::new();
        for (identity, seen) in iter {
            sightings.insert(identity, seen);
        }
        sightings
    }
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, StoreEntry>,
    revision: u64,
}

impl Inner {
    fn next_revision(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }
}

/// Latest known record per aircraft.
///
/// One mutex guards the whole map, including every dirty flag. It is held only
/// for a single read-modify-write or a single purge sweep and never across a
/// publish.
#[derive(Debug, Default)]
pub struct PositionStore {
    inner: Mutex<Inner>,
}

impl PositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    // The map only holds plain data, so a panic in another holder leaves the
    // last completed write intact.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Merge one normalized record. Returns true when the store changed.
    pub fn upsert(&self, record: TrackedObjectRecord) -> bool {
        if !record.is_admissible() {
            debug!(%record, "rejecting inadmissible record");
            return false;
        }

        let mut guard = self.lock();
        let inner = &mut *guard;

        if let Some(entry) = inner.entries.get_mut(&record.identity) {
            match has_moved(&entry.record, &record) {
                Ok(true) => {
                    inner.revision += 1;
                    entry.record = record;
                    entry.dirty = true;
                    entry.revision = inner.revision;
                    true
                }
                Ok(false) => false,
                Err(err) => {
                    debug!(error = %err, "ignoring record that cannot be compared");
                    false
                }
            }
        } else {
            let revision = inner.next_revision();
            inner.entries.insert(
                record.identity.clone(),
                StoreEntry {
                    record,
                    dirty: true,
                    revision,
                },
            );
            true
        }
    }

    /// Drop every entry whose identity is not in `present`.
    pub fn remove_if_absent(&self, present: &HashSet<String>) -> usize {
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|identity, _| present.contains(identity));
        before - inner.entries.len()
    }

    /// Drop every entry whose stored seen age exceeds `max_age`.
    pub fn remove_if_stale(&self, max_age: Duration) -> usize {
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner
            .entries
            .retain(|_, entry| entry.record.seen_age() <= max_age);
        before - inner.entries.len()
    }

    /// The per-snapshot sweep: remove absent entries, then entries older than
    /// `max_age`, in one pass under the lock.
    ///
    /// The age of a present entry is the one the snapshot reported, since an
    /// unchanged record is not rewritten on merge and its stored age lags.
    pub fn purge(&self, sightings: &Sightings, max_age: Duration) -> PurgeStats {
        let mut inner = self.lock();
        let mut stats = PurgeStats::default();

        inner.entries.retain(|identity, entry| {
            if !sightings.contains(identity) {
                stats.absent += 1;
                return false;
            }
            let age = sightings
                .reported_age(identity)
                .unwrap_or_else(|| entry.record.seen_age());
            if age > max_age {
                stats.stale += 1;
                return false;
            }
            true
        });

        stats
    }

    /// Consistent copy of every dirty entry, ordered by identity.
    pub fn dirty_entries(&self) -> Vec<DirtyEntry> {
        let inner = self.lock();
        let mut dirty: Vec<DirtyEntry> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.dirty)
            .map(|(identity, entry)| DirtyEntry {
                identity: identity.clone(),
                revision: entry.revision,
                record: entry.record.clone(),
            })
            .collect();
        dirty.sort_by(|a, b| a.identity.cmp(&b.identity));
        dirty
    }

    /// Clear the dirty flag after a successful publish of `revision`.
    ///
    /// Returns false when the entry was removed or changed again in the
    /// meantime; a superseded entry stays dirty.
    pub fn mark_published(&self, identity: &str, revision: u64) -> bool {
        let mut inner = self.lock();
        match inner.entries.get_mut(identity) {
            Some(entry) if entry.revision == revision => {
                entry.dirty = false;
                true
            }
            _ => false,
        }
    }

    /// True while `identity` is still stored at `revision` and not yet
    /// published.
    pub fn is_current(&self, identity: &str, revision: u64) -> bool {
        matches!(
            self.lock().entries.get(identity),
            Some(entry) if entry.dirty && entry.revision == revision
        )
    }

    pub fn get(&self, identity: &str) -> Option<StoreEntry> {
        self.lock().entries.get(identity).cloned()
    }

    pub fn is_dirty(&self, identity: &str) -> Option<bool> {
        self.lock().entries.get(identity).map(|entry| entry.dirty)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn dirty_count(&self) -> usize {
        self.lock()
            .entries
            .values()
            .filter(|entry| entry.dirty)
            .count()
    }

    /// Sorted identities currently tracked.
    pub fn identities(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().entries.keys().cloned().collect();
        ids.sort();
        ids
    }
}
