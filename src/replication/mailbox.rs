//! Peer mailboxes
//!
//! Each peer owns one unbounded FIFO of inbound change events. The
//! sending half is cloned into the broadcaster; the receiving half is
//! moved into the peer's applier, so nothing else can drain it.

use std::time::Duration;

use tokio::sync::mpsc;

use super::protocol::ChangeEvent;
use crate::peer::PeerId;

/// Result of waiting on a mailbox
#[derive(Debug)]
pub enum Received {
    /// Next event in arrival order
    Event(ChangeEvent),
    /// Nothing arrived within the idle timeout
    Idle,
    /// Every sender is gone
    Closed,
}

/// Create the mailbox for a peer
pub fn mailbox(owner: PeerId) -> (MailboxSender, Mailbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (MailboxSender { owner, tx }, Mailbox { owner, rx })
}

/// Posting side of a peer's mailbox
#[derive(Debug, Clone)]
pub struct MailboxSender {
    owner: PeerId,
    tx: mpsc::UnboundedSender<ChangeEvent>,
}

impl MailboxSender {
    /// Peer that owns the mailbox
    pub fn owner(&self) -> PeerId {
        self.owner
    }

    /// Append an event; never blocks.
    ///
    /// Returns false if the owning applier has been dropped.
    pub fn post(&self, event: ChangeEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Receiving side of a peer's mailbox
#[derive(Debug)]
pub struct Mailbox {
    owner: PeerId,
    rx: mpsc::UnboundedReceiver<ChangeEvent>,
}

impl Mailbox {
    /// Peer that owns the mailbox
    pub fn owner(&self) -> PeerId {
        self.owner
    }

    /// Wait for the next event, giving up after `idle_timeout`
    pub async fn recv_timeout(&mut self, idle_timeout: Duration) -> Received {
        match tokio::time::timeout(idle_timeout, self.rx.recv()).await {
            Ok(Some(event)) => Received::Event(event),
            Ok(None) => Received::Closed,
            Err(_) => Received::Idle,
        }
    }

    /// Take the next event if one is already queued
    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        self.rx.try_recv().ok()
    }
}
