use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

use crate::codec::{self, CodecError};
use crate::mesh::Mesh;

/// Serialized mesh collection. Immutable once built; cloning shares the bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MeshBlob(Arc<[u8]>);

impl MeshBlob {
    pub fn empty() -> Self {
        Self(Arc::from(Vec::new()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Default for MeshBlob {
    fn default() -> Self {
        Self::empty()
    }
}

impl Deref for MeshBlob {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for MeshBlob {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Arc::from(bytes))
    }
}

impl From<&[u8]> for MeshBlob {
    fn from(bytes: &[u8]) -> Self {
        Self(Arc::from(bytes))
    }
}

/// A blob together with the store version it was installed at.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MeshSnapshot {
    pub version: u64,
    pub blob: MeshBlob,
}

/// Process-wide holder of the current mesh blob.
///
/// Cloning a `MeshStore` yields another handle to the same store. `replace`
/// is the only mutator: it swaps the blob reference and bumps the latest
/// version in one step, so readers see either the old or the new blob, never
/// a mix. Version changes can be observed through [`MeshStore::subscribe`].
///
/// Two counters are kept. The *latest* version moves on every `replace`; the
/// *installed* version only moves when a consumer calls
/// [`MeshStore::mark_installed`] after it has acted on a snapshot.
#[derive(Clone, Debug)]
pub struct MeshStore {
    inner: Arc<StoreInner>,
}

#[derive(Debug)]
struct StoreInner {
    latest: watch::Sender<MeshSnapshot>,
    installed: AtomicU64,
}

impl Default for MeshStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MeshStore {
    pub fn new() -> Self {
        let (latest, _) = watch::channel(MeshSnapshot::default());
        Self { inner: Arc::new(StoreInner { latest, installed: AtomicU64::new(0) }) }
    }

    /// Current blob; empty when nothing has been installed yet.
    pub fn get(&self) -> MeshBlob {
        self.inner.latest.borrow().blob.clone()
    }

    pub fn snapshot(&self) -> MeshSnapshot {
        self.inner.latest.borrow().clone()
    }

    /// Swap in a new blob and return the new latest version.
    pub fn replace(&self, blob: impl Into<MeshBlob>) -> u64 {
        let blob = blob.into();
        let len = blob.len();
        let mut version = 0;
        self.inner.latest.send_modify(|snapshot| {
            snapshot.version += 1;
            snapshot.blob = blob;
            version = snapshot.version;
        });
        log::debug!("mesh_store: replaced blob ({} bytes) -> v{}", len, version);
        version
    }

    /// Encode `meshes` and swap them in. Nothing changes if they are too
    /// large to encode.
    pub fn replace_meshes(&self, meshes: &[Mesh]) -> Result<u64, CodecError> {
        Ok(self.replace(codec::try_encode(meshes)?))
    }

    /// Decode the current blob. An empty store decodes to no meshes.
    pub fn meshes(&self) -> Result<Vec<Mesh>, CodecError> {
        let blob = self.get();
        if blob.is_empty() {
            return Ok(Vec::new());
        }
        codec::decode(&blob)
    }

    pub fn latest_version(&self) -> u64 {
        self.inner.latest.borrow().version
    }

    pub fn installed_version(&self) -> u64 {
        self.inner.installed.load(Ordering::Acquire)
    }

    /// Record that `version` has been acted on. Never moves backwards.
    pub fn mark_installed(&self, version: u64) -> u64 {
        let version = version.min(self.latest_version());
        let previous = self.inner.installed.fetch_max(version, Ordering::AcqRel);
        previous.max(version)
    }

    pub fn needs_install(&self) -> bool {
        self.installed_version() < self.latest_version()
    }

    /// Receiver that is notified on every `replace`.
    pub fn subscribe(&self) -> watch::Receiver<MeshSnapshot> {
        self.inner.latest.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_store() {
        let store = MeshStore::new();
        assert!(store.get().is_empty());
        assert_eq!(store.latest_version(), 0);
        assert_eq!(store.installed_version(), 0);
        assert!(!store.needs_install());
        assert_eq!(store.meshes().expect("empty decodes"), Vec::<Mesh>::new());
    }

    #[test]
    fn replace_bumps_latest_only() {
        let store = MeshStore::new();
        assert_eq!(store.replace(vec![1, 2, 3]), 1);
        assert_eq!(store.latest_version(), 1);
        assert_eq!(store.installed_version(), 0);
        assert!(store.needs_install());
        assert_eq!(store.get().as_bytes(), &[1, 2, 3]);
    }

    #[test]
    fn mark_installed_is_monotonic_and_bounded() {
        let store = MeshStore::new();
        store.replace(vec![1]);
        store.replace(vec![2]);
        assert_eq!(store.mark_installed(2), 2);
        assert_eq!(store.mark_installed(1), 2);
        assert_eq!(store.mark_installed(99), 2);
        assert!(!store.needs_install());
    }

    #[test]
    fn clones_share_state() {
        let store = MeshStore::new();
        let other = store.clone();
        other.replace_meshes(&[Mesh::cuboid([0.0; 3], [1.0; 3])]).expect("encode");
        assert_eq!(store.latest_version(), 1);
        assert_eq!(store.meshes().expect("decode").len(), 1);
    }

    #[test]
    fn garbage_blob_fails_lazily() {
        let store = MeshStore::new();
        store.replace(vec![0xde, 0xad]);
        assert!(store.meshes().is_err());
    }

    #[tokio::test]
    async fn subscribers_see_replacements() {
        let store = MeshStore::new();
        let mut rx = store.subscribe();
        store.replace(vec![7]);
        rx.changed().await.expect("store alive");
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.blob.as_bytes(), &[7]);
    }
}
