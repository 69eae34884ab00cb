//! Change Applier
//!
//! Drains one peer's mailbox in arrival order and writes the changes
//! into that peer's directory.

use std::ffi::{OsStr, OsString};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::echo::EchoNotifier;
use super::mailbox::{Mailbox, Received};
use super::protocol::ChangeEvent;
use super::PeerWorker;
use crate::error::{Error, Result};
use crate::peer::{Peer, PeerId};
use crate::report::Reporter;
use crate::state::{Fingerprint, LedgerAction, SyncLedger};

/// Prefix of the hidden files updates are staged in before the rename
pub(crate) const STAGING_PREFIX: &str = ".wolfsync-staging.";

/// Check whether a directory entry is an in-flight staging file
pub(crate) fn is_staging_name(filename: &OsStr) -> bool {
    filename.to_string_lossy().starts_with(STAGING_PREFIX)
}

fn staging_path(root: &Path, filename: &OsStr) -> PathBuf {
    let mut name = OsString::from(STAGING_PREFIX);
    name.push(filename);
    root.join(name)
}

/// What applying an event did to the local directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppliedChange {
    /// File overwritten with the given number of bytes
    Written(usize),
    /// File removed
    Removed,
    /// Delete for a file that was not there
    AlreadyAbsent,
}

/// Per-peer change applier
pub struct ChangeApplier {
    peer: Arc<Peer>,
    mailbox: Mailbox,
    reporter: Reporter,
    ledger: SyncLedger,
    echoes: EchoNotifier,
    idle_timeout: Duration,
}

impl ChangeApplier {
    /// Create an applier; takes sole ownership of the peer's mailbox
    pub fn new(
        peer: Arc<Peer>,
        mailbox: Mailbox,
        reporter: Reporter,
        ledger: SyncLedger,
        echoes: EchoNotifier,
        idle_timeout: Duration,
    ) -> Self {
        debug_assert_eq!(peer.id(), mailbox.owner());
        debug_assert_eq!(peer.id(), echoes.owner());
        Self {
            peer,
            mailbox,
            reporter,
            ledger,
            echoes,
            idle_timeout,
        }
    }

    /// Apply a single event to the local directory.
    ///
    /// Updates are written to a staging file and renamed over the target,
    /// so the local detector never reads a half-written file and an
    /// existing symlink is replaced rather than written through.
    pub async fn apply(&self, event: &ChangeEvent) -> Result<AppliedChange> {
        if !event.has_plain_filename() {
            return Err(Error::InvalidEvent(format!(
                "{} from {} names {:?}, not a plain file name",
                event.type_name(),
                event.source_id(),
                event.filename()
            )));
        }
        if is_staging_name(event.filename()) {
            return Err(Error::InvalidEvent(format!(
                "{} from {} names staging file {:?}",
                event.type_name(),
                event.source_id(),
                event.filename()
            )));
        }
        if event.source_id() == self.peer.id() {
            return Err(Error::InvalidEvent(format!(
                "{} for {:?} delivered back to its source {}",
                event.type_name(),
                event.filename(),
                event.source_id()
            )));
        }

        let path = self.peer.root().join(event.filename());
        match event {
            ChangeEvent::Update { filename, contents, .. } => {
                if let Ok(metadata) = tokio::fs::symlink_metadata(&path).await {
                    if metadata.is_dir() {
                        return Err(Error::PathCollision(path));
                    }
                }

                let staging = staging_path(self.peer.root(), filename);
                if let Err(e) = tokio::fs::write(&staging, contents).await {
                    let _ = tokio::fs::remove_file(&staging).await;
                    return Err(Error::transient(staging, e));
                }

                self.echoes.expect_contents(filename, Fingerprint::of(contents));
                if let Err(e) = tokio::fs::rename(&staging, &path).await {
                    self.echoes.withdraw(filename);
                    let _ = tokio::fs::remove_file(&staging).await;
                    return Err(write_error(&path, e).await);
                }
                self.ledger.record(filename, LedgerAction::Applied);
                self.reporter
                    .applied_update(self.peer.id(), filename, self.peer.root(), contents.len());
                Ok(AppliedChange::Written(contents.len()))
            }
            ChangeEvent::Delete { filename, .. } => {
                match tokio::fs::symlink_metadata(&path).await {
                    Ok(metadata) if metadata.is_dir() => return Ok(AppliedChange::AlreadyAbsent),
                    Ok(_) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {
                        return Ok(AppliedChange::AlreadyAbsent)
                    }
                    Err(e) => return Err(Error::transient(path, e)),
                }

                self.echoes.expect_absent(filename);
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => {}
                    // Lost a race with a local delete
                    Err(e) if e.kind() == ErrorKind::NotFound => {
                        return Ok(AppliedChange::AlreadyAbsent)
                    }
                    Err(e) => {
                        self.echoes.withdraw(filename);
                        return Err(Error::transient(path, e));
                    }
                }
                self.ledger.record(filename, LedgerAction::Removed);
                self.reporter
                    .applied_delete(self.peer.id(), filename, self.peer.root());
                Ok(AppliedChange::Removed)
            }
        }
    }
}

/// Classify a failed rename, spotting a directory in the way
async fn write_error(path: &Path, error: std::io::Error) -> Error {
    match tokio::fs::symlink_metadata(path).await {
        Ok(metadata) if metadata.is_dir() => Error::PathCollision(path.to_path_buf()),
        _ => Error::transient(path, error),
    }
}

#[async_trait::async_trait]
impl PeerWorker for ChangeApplier {
    fn peer_id(&self) -> PeerId {
        self.peer.id()
    }

    fn role(&self) -> &'static str {
        "applier"
    }

    async fn run(self: Box<Self>) -> Result<()> {
        let mut applier = self;
        tracing::info!(
            peer = %applier.peer.id(),
            "Change applier started for {}",
            applier.peer.root().display()
        );

        loop {
            match applier.mailbox.recv_timeout(applier.idle_timeout).await {
                Received::Event(event) => {
                    match applier.apply(&event).await {
                        Ok(AppliedChange::AlreadyAbsent) => {
                            tracing::debug!(
                                peer = %applier.peer.id(),
                                file = %event.filename().to_string_lossy(),
                                "Delete for absent file ignored"
                            );
                        }
                        Ok(_) => {}
                        // Dropped; a later change on the source resends
                        Err(e) => applier.reporter.event_failed(applier.peer.id(), &e),
                    }
                }
                Received::Idle => {
                    tracing::trace!(peer = %applier.peer.id(), "Mailbox idle");
                }
                Received::Closed => {
                    tracing::debug!(peer = %applier.peer.id(), "Mailbox closed, applier stopping");
                    return Ok(());
                }
            }
        }
    }
}
