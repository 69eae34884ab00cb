//! Sync Ledger
//!
//! Diagnostic record of when each file was last served or applied on a
//! peer. Only used for reporting; the engine never reads it back to make
//! decisions.

use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

/// What happened to the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerAction {
    /// Local change sent to the other peers
    Served,
    /// Remote change written locally
    Applied,
    /// Remote delete removed the local file
    Removed,
}

impl std::fmt::Display for LedgerAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerAction::Served => write!(f, "SERVED"),
            LedgerAction::Applied => write!(f, "APPLIED"),
            LedgerAction::Removed => write!(f, "REMOVED"),
        }
    }
}

/// A single ledger record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerEntry {
    pub action: LedgerAction,
    pub at: DateTime<Utc>,
}

/// Per-peer ledger shared by that peer's detector and applier
#[derive(Debug, Clone, Default)]
pub struct SyncLedger {
    entries: Arc<Mutex<HashMap<OsString, LedgerEntry>>>,
}

impl SyncLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<OsString, LedgerEntry>> {
        // A panic while holding the lock cannot leave the map half-updated
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record an action on `filename` at the current time
    pub fn record(&self, filename: &OsStr, action: LedgerAction) {
        let entry = LedgerEntry {
            action,
            at: Utc::now(),
        };
        self.lock().insert(filename.to_os_string(), entry);
    }

    /// Last record for `filename`
    pub fn get(&self, filename: &OsStr) -> Option<LedgerEntry> {
        self.lock().get(filename).copied()
    }

    /// All records, sorted by filename
    pub fn entries(&self) -> Vec<(OsString, LedgerEntry)> {
        let mut entries: Vec<_> = self
            .lock()
            .iter()
            .map(|(name, entry)| (name.clone(), *entry))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
