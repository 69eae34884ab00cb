//! Progress reporting
//!
//! All peers report through one `Reporter`. Lines go to the installed
//! tracing subscriber, which writes each event as a single line under
//! its writer lock, so concurrent peers never interleave mid-line.
//! Counters are kept alongside for the shutdown summary.

use std::ffi::OsStr;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::Error;
use crate::peer::PeerId;

/// Engine-wide event counters
#[derive(Debug, Default)]
pub struct SyncStats {
    updates_served: AtomicU64,
    deletes_served: AtomicU64,
    updates_applied: AtomicU64,
    deletes_applied: AtomicU64,
    errors: AtomicU64,
}

/// Point-in-time copy of `SyncStats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub updates_served: u64,
    pub deletes_served: u64,
    pub updates_applied: u64,
    pub deletes_applied: u64,
    pub errors: u64,
}

impl SyncStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            updates_served: self.updates_served.load(Ordering::Relaxed),
            deletes_served: self.deletes_served.load(Ordering::Relaxed),
            updates_applied: self.updates_applied.load(Ordering::Relaxed),
            deletes_applied: self.deletes_applied.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Serialized reporting sink shared by every detector and applier
#[derive(Debug, Clone, Default)]
pub struct Reporter {
    stats: Arc<SyncStats>,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn served_update(&self, peer: PeerId, filename: &OsStr, root: &Path, recipients: usize) {
        self.stats.updates_served.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            %peer,
            file = %filename.to_string_lossy(),
            recipients,
            "Serving UPDATE from {}",
            root.display()
        );
    }

    pub fn served_delete(&self, peer: PeerId, filename: &OsStr, root: &Path, recipients: usize) {
        self.stats.deletes_served.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            %peer,
            file = %filename.to_string_lossy(),
            recipients,
            "Serving DELETE from {}",
            root.display()
        );
    }

    pub fn applied_update(&self, peer: PeerId, filename: &OsStr, root: &Path, bytes: usize) {
        self.stats.updates_applied.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            %peer,
            file = %filename.to_string_lossy(),
            bytes,
            "Updated file in {}",
            root.display()
        );
    }

    pub fn applied_delete(&self, peer: PeerId, filename: &OsStr, root: &Path) {
        self.stats.deletes_applied.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            %peer,
            file = %filename.to_string_lossy(),
            "Deleted file in {}",
            root.display()
        );
    }

    /// Report an error that dropped a single event or skipped a file
    pub fn event_failed(&self, peer: PeerId, error: &Error) {
        self.stats.errors.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(%peer, "{}", error);
    }

    /// Log the final counters
    pub fn summary(&self) {
        let stats = self.stats();
        tracing::info!(
            updates_served = stats.updates_served,
            deletes_served = stats.deletes_served,
            updates_applied = stats.updates_applied,
            deletes_applied = stats.deletes_applied,
            errors = stats.errors,
            "Sync summary"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_shared_between_clones() {
        let reporter = Reporter::new();
        let clone = reporter.clone();
        let root = Path::new("/srv/a");
        let name = OsStr::new("a.txt");

        reporter.served_update(PeerId(1), name, root, 2);
        clone.served_delete(PeerId(1), name, root, 2);
        clone.applied_update(PeerId(2), name, root, 5);
        reporter.applied_delete(PeerId(2), name, root);
        reporter.event_failed(PeerId(2), &Error::InvalidEvent("bad".into()));

        assert_eq!(
            reporter.stats(),
            StatsSnapshot {
                updates_served: 1,
                deletes_served: 1,
                updates_applied: 1,
                deletes_applied: 1,
                errors: 1,
            }
        );
    }
}
