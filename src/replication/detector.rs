//! Change Detector
//!
//! Polls one peer's directory, fingerprints every flat file and
//! broadcasts updates and deletes to the other peers.

use std::ffi::{OsStr, OsString};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};

use super::applier::is_staging_name;
use super::broadcast::Broadcaster;
use super::echo::{EchoFilter, Expectation};
use super::protocol::ChangeEvent;
use super::PeerWorker;
use crate::error::{Error, Result};
use crate::peer::{Peer, PeerId};
use crate::report::Reporter;
use crate::state::{DirectorySnapshot, Fingerprint, FingerprintTable, LedgerAction, SyncLedger};

/// Outcome of one poll cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    /// Update events broadcast
    pub updates: usize,
    /// Delete events broadcast
    pub deletes: usize,
    /// Files listed but not readable this cycle
    pub skipped: usize,
}

impl PollSummary {
    pub fn is_empty(&self) -> bool {
        self.updates == 0 && self.deletes == 0 && self.skipped == 0
    }
}

/// Per-peer change detector
pub struct ChangeDetector {
    peer: Arc<Peer>,
    broadcaster: Broadcaster,
    reporter: Reporter,
    ledger: SyncLedger,
    poll_interval: Duration,
    fingerprints: FingerprintTable,
    /// `None` until the first poll completes
    snapshot: Option<DirectorySnapshot>,
    /// Changes our own applier made, not to be served again
    echoes: EchoFilter,
}

impl ChangeDetector {
    /// Create a detector for `peer`
    pub fn new(
        peer: Arc<Peer>,
        broadcaster: Broadcaster,
        reporter: Reporter,
        ledger: SyncLedger,
        echoes: EchoFilter,
        poll_interval: Duration,
    ) -> Self {
        debug_assert_eq!(peer.id(), echoes.owner());
        Self {
            peer,
            broadcaster,
            reporter,
            ledger,
            poll_interval,
            fingerprints: FingerprintTable::new(),
            snapshot: None,
            echoes,
        }
    }

    /// Number of files with a recorded fingerprint
    pub fn tracked_files(&self) -> usize {
        self.fingerprints.len()
    }

    /// List the flat files directly under the root
    async fn list_files(&self) -> Result<DirectorySnapshot> {
        let root = self.peer.root();
        let mut entries = tokio::fs::read_dir(root)
            .await
            .map_err(|e| Error::transient(root, e))?;

        let mut files = DirectorySnapshot::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::transient(root, e))?
        {
            // Follows symlinks; an entry that vanished is still listed
            // so the read below reports it
            let name = entry.file_name();
            if is_staging_name(&name) {
                continue;
            }
            match tokio::fs::metadata(entry.path()).await {
                Ok(metadata) if metadata.is_dir() => continue,
                _ => files.insert(name),
            }
        }

        Ok(files)
    }

    /// Check a freshly read file against what our applier announced.
    ///
    /// Returns true if the observation is the applier's own write and
    /// must not be served.
    fn absorb_applied(&mut self, filename: &OsStr, fingerprint: &Fingerprint) -> bool {
        self.echoes.sync();
        let Some(expectation) = self.echoes.expected(filename) else {
            return false;
        };
        let applied = matches!(expectation, Expectation::Contents(expected) if expected == fingerprint);

        // Announced but the file has not been replaced yet
        if !applied && self.fingerprints.get(filename) == Some(fingerprint) {
            return true;
        }

        // Otherwise a local edit raced the applier and is served as usual
        self.echoes.clear(filename);
        if applied {
            self.fingerprints.observe(filename, fingerprint.clone());
            tracing::trace!(
                peer = %self.peer.id(),
                file = %filename.to_string_lossy(),
                "Applied update absorbed"
            );
        }
        applied
    }

    /// Run a single poll cycle: list, fingerprint, diff, broadcast
    pub async fn poll_once(&mut self) -> Result<PollSummary> {
        self.echoes.begin_cycle();
        let current = self.list_files().await?;
        let cold_start = self.snapshot.is_none();
        let mut summary = PollSummary::default();

        for filename in current.iter() {
            let path = self.peer.root().join(filename);
            let contents = match tokio::fs::read(&path).await {
                Ok(contents) => contents,
                Err(e) => {
                    self.reporter.event_failed(self.peer.id(), &Error::transient(path, e));
                    summary.skipped += 1;
                    continue;
                }
            };

            let fingerprint = Fingerprint::of(&contents);
            if self.absorb_applied(filename, &fingerprint) {
                continue;
            }
            let changed = self.fingerprints.observe(filename, fingerprint);
            if !(cold_start || changed) {
                continue;
            }

            let bytes = contents.len();
            let event = ChangeEvent::update(filename, self.peer.id(), contents);
            let recipients = self.broadcaster.broadcast(self.peer.id(), &event);
            self.ledger.record(filename, LedgerAction::Served);
            self.reporter
                .served_update(self.peer.id(), filename, self.peer.root(), recipients);
            tracing::trace!(peer = %self.peer.id(), bytes, "Update payload queued");
            summary.updates += 1;
        }

        if let Some(previous) = &self.snapshot {
            let removed: Vec<OsString> = previous
                .missing_from(&current)
                .map(|name| name.to_os_string())
                .collect();

            self.echoes.sync();
            for filename in removed {
                self.fingerprints.remove(&filename);
                let applied = self.echoes.expected(&filename) == Some(&Expectation::Absent);
                self.echoes.clear(&filename);
                if applied {
                    tracing::trace!(
                        peer = %self.peer.id(),
                        file = %filename.to_string_lossy(),
                        "Applied delete absorbed"
                    );
                    continue;
                }
                let event = ChangeEvent::delete(filename.clone(), self.peer.id());
                let recipients = self.broadcaster.broadcast(self.peer.id(), &event);
                self.ledger.record(&filename, LedgerAction::Served);
                self.reporter
                    .served_delete(self.peer.id(), &filename, self.peer.root(), recipients);
                summary.deletes += 1;
            }
        }

        self.snapshot = Some(current);
        self.echoes.end_cycle();
        Ok(summary)
    }
}

#[async_trait::async_trait]
impl PeerWorker for ChangeDetector {
    fn peer_id(&self) -> PeerId {
        self.peer.id()
    }

    fn role(&self) -> &'static str {
        "detector"
    }

    async fn run(self: Box<Self>) -> Result<()> {
        let mut detector = self;
        tracing::info!(
            peer = %detector.peer.id(),
            "Change detector started for {} (poll every {:?})",
            detector.peer.root().display(),
            detector.poll_interval
        );

        let mut ticker = interval(detector.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match detector.poll_once().await {
                Ok(summary) if !summary.is_empty() => {
                    tracing::debug!(
                        peer = %detector.peer.id(),
                        updates = summary.updates,
                        deletes = summary.deletes,
                        skipped = summary.skipped,
                        "Poll cycle complete"
                    );
                }
                Ok(_) => {}
                // Root unreadable; the snapshot is kept and the next cycle retries
                Err(e) => detector.reporter.event_failed(detector.peer.id(), &e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replication::echo::{echo_channel, EchoNotifier};
    use crate::replication::mailbox::{mailbox, Mailbox};
    use std::path::Path;
    use tempfile::tempdir;

    fn detector_with_echoes(root: &Path, peers: u32) -> (ChangeDetector, Vec<Mailbox>, EchoNotifier) {
        let (senders, receivers): (Vec<_>, Vec<_>) = (1..=peers).map(|id| mailbox(PeerId(id))).unzip();
        let (notifier, echoes) = echo_channel(PeerId(1));
        let detector = ChangeDetector::new(
            Arc::new(Peer::new(PeerId(1), root.to_path_buf())),
            Broadcaster::new(senders),
            Reporter::new(),
            SyncLedger::new(),
            echoes,
            Duration::from_millis(10),
        );
        (detector, receivers, notifier)
    }

    fn detector_for(root: &Path, peers: u32) -> (ChangeDetector, Vec<Mailbox>) {
        let (detector, receivers, _notifier) = detector_with_echoes(root, peers);
        (detector, receivers)
    }

    fn drain(mailbox: &mut Mailbox) -> Vec<ChangeEvent> {
        std::iter::from_fn(|| mailbox.try_recv()).collect()
    }

    #[tokio::test]
    async fn test_cold_start_serves_existing_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"hello").unwrap();
        std::fs::write(dir.path().join("data.bin"), [0u8, 159, 146, 150]).unwrap();
        std::fs::create_dir(dir.path().join("subdir")).unwrap();

        let (mut detector, mut mailboxes) = detector_for(dir.path(), 3);
        let summary = detector.poll_once().await.unwrap();
        assert_eq!(summary, PollSummary { updates: 2, deletes: 0, skipped: 0 });
        assert_eq!(detector.tracked_files(), 2);

        // Nothing for ourselves
        assert!(drain(&mut mailboxes[0]).is_empty());

        for mailbox in &mut mailboxes[1..] {
            let mut events = drain(mailbox);
            events.sort_by(|a, b| a.filename().cmp(b.filename()));
            assert_eq!(
                events,
                vec![
                    ChangeEvent::update("data.bin", PeerId(1), vec![0u8, 159, 146, 150]),
                    ChangeEvent::update("notes.txt", PeerId(1), &b"hello"[..]),
                ]
            );
        }
    }

    #[tokio::test]
    async fn test_unchanged_content_is_suppressed() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        std::fs::write(&file, b"hello").unwrap();

        let (mut detector, mut mailboxes) = detector_for(dir.path(), 2);
        detector.poll_once().await.unwrap();
        assert_eq!(drain(&mut mailboxes[1]).len(), 1);

        // Same bytes rewritten
        std::fs::write(&file, b"hello").unwrap();
        let summary = detector.poll_once().await.unwrap();
        assert!(summary.is_empty());
        assert!(drain(&mut mailboxes[1]).is_empty());

        std::fs::write(&file, b"hello again").unwrap();
        let summary = detector.poll_once().await.unwrap();
        assert_eq!(summary.updates, 1);
        assert_eq!(
            drain(&mut mailboxes[1]),
            vec![ChangeEvent::update("notes.txt", PeerId(1), &b"hello again"[..])]
        );
    }

    #[tokio::test]
    async fn test_delete_detection() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        std::fs::write(&file, b"hello").unwrap();

        let (mut detector, mut mailboxes) = detector_for(dir.path(), 2);
        detector.poll_once().await.unwrap();
        drain(&mut mailboxes[1]);

        std::fs::remove_file(&file).unwrap();
        let summary = detector.poll_once().await.unwrap();
        assert_eq!(summary.deletes, 1);
        assert_eq!(detector.tracked_files(), 0);
        assert_eq!(
            drain(&mut mailboxes[1]),
            vec![ChangeEvent::delete("notes.txt", PeerId(1))]
        );

        // Reported once only
        assert!(detector.poll_once().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_deletes_on_first_cycle() {
        let dir = tempdir().unwrap();
        let (mut detector, mut mailboxes) = detector_for(dir.path(), 2);
        assert!(detector.poll_once().await.unwrap().is_empty());
        assert!(drain(&mut mailboxes[1]).is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unreadable_entry_is_skipped() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("ok.txt"), b"fine").unwrap();
        // Dangling symlink: listed, but reading it fails
        std::os::unix::fs::symlink(dir.path().join("missing"), dir.path().join("dangling")).unwrap();

        let (mut detector, mut mailboxes) = detector_for(dir.path(), 2);
        let summary = detector.poll_once().await.unwrap();
        assert_eq!(summary, PollSummary { updates: 1, deletes: 0, skipped: 1 });
        assert_eq!(drain(&mut mailboxes[1]).len(), 1);

        // Once it is gone from the listing a delete is sent
        std::fs::remove_file(dir.path().join("dangling")).unwrap();
        let summary = detector.poll_once().await.unwrap();
        assert_eq!(summary.deletes, 1);
        assert_eq!(
            drain(&mut mailboxes[1]),
            vec![ChangeEvent::delete("dangling", PeerId(1))]
        );
    }

    #[tokio::test]
    async fn test_applied_update_is_not_served_back() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        std::fs::write(&file, b"v1").unwrap();

        let (mut detector, mut mailboxes, notifier) = detector_with_echoes(dir.path(), 2);
        detector.poll_once().await.unwrap();
        drain(&mut mailboxes[1]);

        // What the applier does for a remote update
        notifier.expect_contents(OsStr::new("notes.txt"), Fingerprint::of(b"v2"));
        std::fs::write(&file, b"v2").unwrap();
        assert!(detector.poll_once().await.unwrap().is_empty());
        assert!(drain(&mut mailboxes[1]).is_empty());

        // A later local edit is still served
        std::fs::write(&file, b"v3").unwrap();
        assert_eq!(detector.poll_once().await.unwrap().updates, 1);
        assert_eq!(
            drain(&mut mailboxes[1]),
            vec![ChangeEvent::update("notes.txt", PeerId(1), &b"v3"[..])]
        );
    }

    #[tokio::test]
    async fn test_announced_update_waits_for_rename() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        std::fs::write(&file, b"v1").unwrap();

        let (mut detector, mut mailboxes, notifier) = detector_with_echoes(dir.path(), 2);
        detector.poll_once().await.unwrap();
        drain(&mut mailboxes[1]);

        // Announced, old contents still in place for this cycle
        notifier.expect_contents(OsStr::new("notes.txt"), Fingerprint::of(b"v2"));
        assert!(detector.poll_once().await.unwrap().is_empty());

        std::fs::write(&file, b"v2").unwrap();
        assert!(detector.poll_once().await.unwrap().is_empty());
        assert!(drain(&mut mailboxes[1]).is_empty());
    }

    #[tokio::test]
    async fn test_applied_delete_is_not_served_back() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        std::fs::write(&file, b"v1").unwrap();

        let (mut detector, mut mailboxes, notifier) = detector_with_echoes(dir.path(), 2);
        detector.poll_once().await.unwrap();
        drain(&mut mailboxes[1]);

        notifier.expect_absent(OsStr::new("notes.txt"));
        std::fs::remove_file(&file).unwrap();
        assert!(detector.poll_once().await.unwrap().is_empty());
        assert!(drain(&mut mailboxes[1]).is_empty());
        assert_eq!(detector.tracked_files(), 0);

        // Recreated locally afterwards: served as new
        std::fs::write(&file, b"again").unwrap();
        assert_eq!(detector.poll_once().await.unwrap().updates, 1);
    }

    #[tokio::test]
    async fn test_staging_files_are_ignored() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(".wolfsync-staging.notes.txt"), b"partial").unwrap();

        let (mut detector, mut mailboxes) = detector_for(dir.path(), 2);
        assert!(detector.poll_once().await.unwrap().is_empty());
        assert!(drain(&mut mailboxes[1]).is_empty());
    }

    #[tokio::test]
    async fn test_missing_root_is_transient() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("not-there");
        let (mut detector, _mailboxes) = detector_for(&root, 2);
        let err = detector.poll_once().await.unwrap_err();
        assert!(err.is_transient());
    }
}
