//! State Management Module
//!
//! Per-peer bookkeeping: the detector's fingerprint table and directory
//! snapshot, and the diagnostic sync ledger.

mod fingerprint;
mod ledger;

pub use fingerprint::{DirectorySnapshot, Fingerprint, FingerprintTable};
pub use ledger::{LedgerAction, LedgerEntry, SyncLedger};
