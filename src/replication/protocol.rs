//! Replication Protocol
//!
//! Defines the change events exchanged between peers.

use std::ffi::{OsStr, OsString};
use std::path::{Component, Path};

use bytes::Bytes;

use crate::peer::PeerId;

/// A change observed on one peer, to be applied on the others
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// File created or modified; carries the whole new contents
    Update {
        filename: OsString,
        source_id: PeerId,
        contents: Bytes,
    },

    /// File removed
    Delete {
        filename: OsString,
        source_id: PeerId,
    },
}

impl ChangeEvent {
    /// Create an update event
    pub fn update(filename: impl Into<OsString>, source_id: PeerId, contents: impl Into<Bytes>) -> Self {
        ChangeEvent::Update {
            filename: filename.into(),
            source_id,
            contents: contents.into(),
        }
    }

    /// Create a delete event
    pub fn delete(filename: impl Into<OsString>, source_id: PeerId) -> Self {
        ChangeEvent::Delete {
            filename: filename.into(),
            source_id,
        }
    }

    /// Get the event type name (for logging)
    pub fn type_name(&self) -> &'static str {
        match self {
            ChangeEvent::Update { .. } => "UPDATE",
            ChangeEvent::Delete { .. } => "DELETE",
        }
    }

    /// Relative filename the event refers to
    pub fn filename(&self) -> &OsStr {
        match self {
            ChangeEvent::Update { filename, .. } | ChangeEvent::Delete { filename, .. } => filename.as_os_str(),
        }
    }

    /// Peer whose detector produced the event
    pub fn source_id(&self) -> PeerId {
        match self {
            ChangeEvent::Update { source_id, .. } | ChangeEvent::Delete { source_id, .. } => *source_id,
        }
    }

    /// Check that the filename is a single plain path component
    pub fn has_plain_filename(&self) -> bool {
        let mut components = Path::new(self.filename()).components();
        matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        )
    }
}
