//! Broadcast dispatcher
//!
//! Fans an event out to every mailbox except the sender's own.

use std::sync::Arc;

use super::mailbox::MailboxSender;
use super::protocol::ChangeEvent;
use crate::peer::PeerId;

/// Fan-out over all peers' mailboxes
#[derive(Debug, Clone)]
pub struct Broadcaster {
    mailboxes: Arc<[MailboxSender]>,
}

impl Broadcaster {
    /// Build a broadcaster over the given mailbox senders
    pub fn new(mailboxes: Vec<MailboxSender>) -> Self {
        Self {
            mailboxes: mailboxes.into(),
        }
    }

    /// Number of peers reachable through this broadcaster
    pub fn peer_count(&self) -> usize {
        self.mailboxes.len()
    }

    /// Post `event` into every mailbox whose owner is not `source_id`.
    ///
    /// Returns the number of mailboxes that accepted the event.
    pub fn broadcast(&self, source_id: PeerId, event: &ChangeEvent) -> usize {
        let mut delivered = 0;
        for mailbox in self.mailboxes.iter().filter(|m| m.owner() != source_id) {
            if mailbox.post(event.clone()) {
                delivered += 1;
            } else {
                tracing::debug!(
                    "Mailbox of {} is closed, dropping {} for {:?}",
                    mailbox.owner(),
                    event.type_name(),
                    event.filename()
                );
            }
        }
        delivered
    }
}
