//! WolfSync - Content-Convergent Directory Synchronization
//!
//! Keeps a set of local directories ("peers") in sync: any file created,
//! modified, or deleted directly under one peer's directory is propagated
//! to all the others.
//!
//! # Architecture
//!
//! Every peer runs two tasks. A change detector polls the directory,
//! fingerprints each file and broadcasts updates and deletes into the
//! other peers' mailboxes. A change applier drains the peer's own mailbox
//! in arrival order and writes the changes locally. There is no leader and
//! no acknowledgment; peers converge once writes stop.
//!
//! # Features
//!
//! - Topology validation that rejects nested sync roots
//! - SHA-256 content fingerprints, so identical rewrites are not resent
//! - Cold-start full sync of pre-existing files
//! - Idempotent deletes and per-event error isolation
//! - Unbounded FIFO mailboxes with no busy waiting

pub mod config;
pub mod error;
pub mod topology;
pub mod peer;
pub mod state;
pub mod replication;
pub mod report;
pub mod coordinator;
pub mod tuning;

pub use config::WolfSyncConfig;
pub use coordinator::{SyncCoordinator, SyncHandle};
pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::WolfSyncConfig;
    pub use crate::coordinator::{SyncCoordinator, SyncHandle};
    pub use crate::error::{Error, Result};
    pub use crate::peer::{Peer, PeerId};
    pub use crate::replication::ChangeEvent;
    pub use crate::state::{Fingerprint, SyncLedger};
}
