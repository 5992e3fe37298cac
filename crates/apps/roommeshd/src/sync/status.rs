use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use roommesh_mesh::MeshStore;
use roommesh_signal::ParticipantId;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::role::Role;
use crate::session::{SessionRole, SyncState};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncStatus {
    pub state: SyncState,
    pub role: SessionRole,
}

/// Transfer counters for one orchestrator.
#[derive(Debug, Default)]
pub struct SyncStats {
    fetches_completed: AtomicU64,
    fetches_discarded: AtomicU64,
    fetches_failed: AtomicU64,
    pushes_served: AtomicU64,
}

impl SyncStats {
    /// Fetches that finished and were acted on, including empty ones.
    pub fn fetches_completed(&self) -> u64 {
        self.fetches_completed.load(Ordering::Acquire)
    }

    /// Fetches dropped because a newer announcement arrived first.
    pub fn fetches_discarded(&self) -> u64 {
        self.fetches_discarded.load(Ordering::Acquire)
    }

    pub fn fetches_failed(&self) -> u64 {
        self.fetches_failed.load(Ordering::Acquire)
    }

    pub fn pushes_served(&self) -> u64 {
        self.pushes_served.load(Ordering::Acquire)
    }

    pub(crate) fn record_completed(&self) {
        self.fetches_completed.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_discarded(&self) {
        self.fetches_discarded.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_failed(&self) {
        self.fetches_failed.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_push(&self) {
        self.pushes_served.fetch_add(1, Ordering::AcqRel);
    }
}

/// Cloneable view onto a running orchestrator.
#[derive(Debug, Clone)]
pub struct SyncHandle {
    pub(crate) id: ParticipantId,
    pub(crate) status: watch::Receiver<SyncStatus>,
    pub(crate) store: MeshStore,
    pub(crate) stats: Arc<SyncStats>,
    pub(crate) stop: CancellationToken,
}

impl SyncHandle {
    pub fn id(&self) -> ParticipantId {
        self.id
    }

    pub fn status(&self) -> SyncStatus {
        *self.status.borrow()
    }

    pub fn state(&self) -> SyncState {
        self.status().state
    }

    pub fn role(&self) -> Option<Role> {
        self.status().role.confirmed()
    }

    pub fn store(&self) -> &MeshStore {
        &self.store
    }

    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// Ask the orchestrator to shut down.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Wait until the published status satisfies `predicate`. Returns `None`
    /// if the orchestrator went away first.
    pub async fn wait_for_status(
        &self,
        mut predicate: impl FnMut(&SyncStatus) -> bool,
    ) -> Option<SyncStatus> {
        let mut status = self.status.clone();
        let matched = status.wait_for(|s| predicate(s)).await.ok().map(|s| *s);
        matched
    }

    pub async fn wait_for_state(&self, state: SyncState) -> Option<SyncStatus> {
        self.wait_for_status(|s| s.state == state).await
    }

    /// Poll until `condition` holds for this handle.
    pub async fn wait_until(&self, mut condition: impl FnMut(&SyncHandle) -> bool) {
        while !condition(self) {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}
