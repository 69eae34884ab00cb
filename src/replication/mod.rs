//! Replication Module
//!
//! Moves changes between peers: each peer's detector broadcasts what
//! changed in its directory, and each peer's applier writes what the
//! others sent. What an applier writes is announced to its own
//! detector so it is not served back out.

pub mod protocol;
pub mod mailbox;
pub mod echo;
mod broadcast;
mod detector;
mod applier;

pub use protocol::ChangeEvent;
pub use mailbox::{mailbox, Mailbox, MailboxSender, Received};
pub use echo::{echo_channel, EchoFilter, EchoNotifier, Expectation};
pub use broadcast::Broadcaster;
pub use detector::{ChangeDetector, PollSummary};
pub use applier::{AppliedChange, ChangeApplier};

use crate::peer::PeerId;

/// Common trait for the long-running per-peer tasks
#[async_trait::async_trait]
pub trait PeerWorker: Send {
    /// Peer this worker serves
    fn peer_id(&self) -> PeerId;

    /// Short name for logging
    fn role(&self) -> &'static str;

    /// Run until cancelled
    async fn run(self: Box<Self>) -> crate::Result<()>;
}
