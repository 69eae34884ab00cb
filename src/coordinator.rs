//! Sync Coordinator
//!
//! Owns the peer set and the Peer→Mailbox wiring, starts one detector and
//! one applier per peer, and supervises them as a single unit.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::task::{JoinError, JoinSet};

use crate::config::WolfSyncConfig;
use crate::error::{Error, Result};
use crate::peer::{Peer, PeerId};
use crate::replication::{echo_channel, mailbox, Broadcaster, ChangeApplier, ChangeDetector, PeerWorker};
use crate::report::{Reporter, StatsSnapshot};
use crate::state::SyncLedger;
use crate::topology::validate_topology;

type TaskOutcome = (PeerId, &'static str, Result<()>);

/// Validated, not yet running sync engine
pub struct SyncCoordinator {
    config: WolfSyncConfig,
    peers: Vec<Arc<Peer>>,
    reporter: Reporter,
}

impl SyncCoordinator {
    /// Validate the configuration and topology and assign peer IDs.
    ///
    /// Nothing is started; every configuration error surfaces here.
    pub fn new(config: WolfSyncConfig) -> Result<Self> {
        config.validate()?;
        let roots = validate_topology(&config.sync.directories)?;

        for root in &roots {
            if !root.is_dir() {
                return Err(Error::Config(format!(
                    "sync root {} is not a directory",
                    root.display()
                )));
            }
        }

        let peers: Vec<Arc<Peer>> = Peer::assign(roots).into_iter().map(Arc::new).collect();
        for peer in &peers {
            tracing::info!("{} -> {}", peer.id(), peer.root().display());
        }

        Ok(Self {
            config,
            peers,
            reporter: Reporter::new(),
        })
    }

    pub fn peers(&self) -> &[Arc<Peer>] {
        &self.peers
    }

    /// Spawn a detector and an applier per peer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self) -> SyncHandle {
        let (senders, receivers): (Vec<_>, Vec<_>) =
            self.peers.iter().map(|peer| mailbox(peer.id())).unzip();
        let broadcaster = Broadcaster::new(senders);

        let mut tasks = JoinSet::new();
        let mut ledgers = HashMap::with_capacity(self.peers.len());

        for (peer, inbox) in self.peers.iter().zip(receivers) {
            let ledger = SyncLedger::new();
            let (notifier, echoes) = echo_channel(peer.id());
            let workers: [Box<dyn PeerWorker>; 2] = [
                Box::new(ChangeDetector::new(
                    Arc::clone(peer),
                    broadcaster.clone(),
                    self.reporter.clone(),
                    ledger.clone(),
                    echoes,
                    self.config.poll_interval(),
                )),
                Box::new(ChangeApplier::new(
                    Arc::clone(peer),
                    inbox,
                    self.reporter.clone(),
                    ledger.clone(),
                    notifier,
                    self.config.idle_timeout(),
                )),
            ];

            for worker in workers {
                let peer_id = worker.peer_id();
                let role = worker.role();
                tasks.spawn(async move { (peer_id, role, worker.run().await) });
            }
            ledgers.insert(peer.id(), ledger);
        }

        tracing::info!(
            peers = self.peers.len(),
            tasks = tasks.len(),
            "Sync engine started"
        );

        SyncHandle {
            peers: self.peers,
            tasks,
            ledgers,
            reporter: self.reporter,
        }
    }

    /// Start the engine and run it until `shutdown` resolves
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut handle = self.start();
        handle.run_until(shutdown).await
    }
}

/// Running sync engine
pub struct SyncHandle {
    peers: Vec<Arc<Peer>>,
    tasks: JoinSet<TaskOutcome>,
    ledgers: HashMap<PeerId, SyncLedger>,
    reporter: Reporter,
}

impl SyncHandle {
    pub fn peers(&self) -> &[Arc<Peer>] {
        &self.peers
    }

    /// Number of peer tasks still running
    pub fn running_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Diagnostic ledger for one peer
    pub fn ledger(&self, peer: PeerId) -> Option<&SyncLedger> {
        self.ledgers.get(&peer)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.reporter.stats()
    }

    /// Supervise the peer tasks until `shutdown` resolves.
    ///
    /// Peer tasks never finish on their own; if one does, the whole engine
    /// is stopped and the exit is returned as an error.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let result = tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Received shutdown signal");
                Ok(())
            }
            Some(joined) = self.tasks.join_next() => Err(task_exit(joined)),
        };

        self.shutdown().await;
        result
    }

    /// Stop every peer task together
    pub async fn shutdown(&mut self) {
        self.tasks.shutdown().await;
        self.reporter.summary();
        tracing::info!("Sync engine stopped");
    }
}

fn task_exit(joined: std::result::Result<TaskOutcome, JoinError>) -> Error {
    let error = match joined {
        Ok((peer, role, Ok(()))) => Error::Internal(format!("{} for {} exited", role, peer)),
        Ok((peer, role, Err(e))) => Error::Internal(format!("{} for {} failed: {}", role, peer, e)),
        Err(e) if e.is_panic() => Error::Internal(format!("peer task panicked: {}", e)),
        Err(_) => Error::ShuttingDown,
    };
    tracing::error!("{}", error);
    error
}
