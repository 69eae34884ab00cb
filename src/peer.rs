//! Peer identity

use std::fmt;
use std::path::{Path, PathBuf};

/// Stable ordinal identifying a peer for the lifetime of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerId(pub u32);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

/// One managed directory taking part in sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    id: PeerId,
    root: PathBuf,
}

impl Peer {
    /// Create a peer for an already resolved root
    pub fn new(id: PeerId, root: PathBuf) -> Self {
        Self { id, root }
    }

    /// Assign IDs 1..N in input order
    pub fn assign(roots: Vec<PathBuf>) -> Vec<Peer> {
        roots
            .into_iter()
            .zip(1u32..)
            .map(|(root, id)| Peer::new(PeerId(id), root))
            .collect()
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
