//! Echo suppression
//!
//! Before the applier replaces or removes a file it tells its own peer's
//! detector what the file will look like afterwards. The detector absorbs
//! a matching observation into its fingerprint table instead of serving it
//! back to the other peers. The fingerprint table itself stays private to
//! the detector.

use std::collections::HashMap;
use std::ffi::{OsStr, OsString};

use tokio::sync::mpsc;

use crate::peer::PeerId;
use crate::state::Fingerprint;

/// Poll cycles an unmatched expectation survives
const EXPECTATION_CYCLES: u64 = 2;

/// State the applier is about to leave a file in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expectation {
    /// File will hold contents with this fingerprint
    Contents(Fingerprint),
    /// File will be gone
    Absent,
}

#[derive(Debug)]
enum Notice {
    Expect {
        filename: OsString,
        expectation: Expectation,
    },
    Withdraw {
        filename: OsString,
    },
}

/// Create the echo channel between a peer's applier and detector
pub fn echo_channel(owner: PeerId) -> (EchoNotifier, EchoFilter) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        EchoNotifier { owner, tx },
        EchoFilter {
            owner,
            rx,
            pending: HashMap::new(),
            cycle: 0,
        },
    )
}

/// Applier side: announces local changes made on behalf of other peers
#[derive(Debug, Clone)]
pub struct EchoNotifier {
    owner: PeerId,
    tx: mpsc::UnboundedSender<Notice>,
}

impl EchoNotifier {
    pub fn owner(&self) -> PeerId {
        self.owner
    }

    /// The file is about to hold contents with `fingerprint`
    pub fn expect_contents(&self, filename: &OsStr, fingerprint: Fingerprint) {
        self.send(Notice::Expect {
            filename: filename.to_os_string(),
            expectation: Expectation::Contents(fingerprint),
        });
    }

    /// The file is about to be removed
    pub fn expect_absent(&self, filename: &OsStr) {
        self.send(Notice::Expect {
            filename: filename.to_os_string(),
            expectation: Expectation::Absent,
        });
    }

    /// The announced change did not happen
    pub fn withdraw(&self, filename: &OsStr) {
        self.send(Notice::Withdraw {
            filename: filename.to_os_string(),
        });
    }

    fn send(&self, notice: Notice) {
        // Detector gone means the engine is stopping
        let _ = self.tx.send(notice);
    }
}

#[derive(Debug)]
struct Pending {
    expectation: Expectation,
    cycle: u64,
}

/// Detector side: outstanding expectations by filename
#[derive(Debug)]
pub struct EchoFilter {
    owner: PeerId,
    rx: mpsc::UnboundedReceiver<Notice>,
    pending: HashMap<OsString, Pending>,
    cycle: u64,
}

impl EchoFilter {
    pub fn owner(&self) -> PeerId {
        self.owner
    }

    /// Start a poll cycle and pick up queued notices
    pub fn begin_cycle(&mut self) {
        self.cycle += 1;
        self.sync();
    }

    /// Drop expectations that have outlived their window.
    ///
    /// An expectation is announced just before the change lands, so one
    /// that is still unmatched after a full listing taken later never will be.
    pub fn end_cycle(&mut self) {
        let cycle = self.cycle;
        self.pending
            .retain(|_, pending| cycle - pending.cycle < EXPECTATION_CYCLES);
    }

    /// Pick up notices queued since the last call
    pub fn sync(&mut self) {
        while let Ok(notice) = self.rx.try_recv() {
            match notice {
                Notice::Expect {
                    filename,
                    expectation,
                } => {
                    self.pending.insert(
                        filename,
                        Pending {
                            expectation,
                            cycle: self.cycle,
                        },
                    );
                }
                Notice::Withdraw { filename } => {
                    self.pending.remove(&filename);
                }
            }
        }
    }

    pub fn expected(&self, filename: &OsStr) -> Option<&Expectation> {
        self.pending.get(filename).map(|pending| &pending.expectation)
    }

    /// Forget the expectation for `filename`
    pub fn clear(&mut self, filename: &OsStr) {
        self.pending.remove(filename);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
