//! Display side of a viewer: react to store version bumps.

use std::sync::Arc;

use roommesh_mesh::{codec, Mesh, MeshStore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Receives every newly installed mesh collection.
pub trait MeshPresenter: Send + Sync {
    fn present(&self, version: u64, meshes: &[Mesh]);
}

/// Presenter that only logs what it would show.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPresenter;

impl MeshPresenter for LogPresenter {
    fn present(&self, version: u64, meshes: &[Mesh]) {
        let triangles: usize = meshes.iter().map(|m| m.triangles.len()).sum();
        log::info!("presenter: v{} {} meshes, {} triangles", version, meshes.len(), triangles);
    }
}

/// Watch `store` and present whenever its installed version lags the latest.
/// Each presented snapshot is then marked installed.
pub fn spawn_display_loop(
    store: MeshStore,
    presenter: Arc<dyn MeshPresenter>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut changes = store.subscribe();
        loop {
            if store.needs_install() {
                let snapshot = changes.borrow_and_update().clone();
                let decoded = if snapshot.blob.is_empty() {
                    Ok(Vec::new())
                } else {
                    codec::decode(&snapshot.blob)
                };
                match decoded {
                    Ok(meshes) => presenter.present(snapshot.version, &meshes),
                    Err(err) => log::warn!("presenter: v{} unusable: {}", snapshot.version, err),
                }
                store.mark_installed(snapshot.version);
                continue;
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(u64, usize)>>);

    impl MeshPresenter for Recorder {
        fn present(&self, version: u64, meshes: &[Mesh]) {
            self.0.lock().expect("recorder").push((version, meshes.len()));
        }
    }

    #[tokio::test]
    async fn presents_each_bump_and_marks_installed() {
        let store = MeshStore::new();
        let recorder = Arc::new(Recorder::default());
        let cancel = CancellationToken::new();
        let task = spawn_display_loop(store.clone(), recorder.clone(), cancel.clone());

        store.replace_meshes(&[Mesh::cuboid([0.0; 3], [1.0; 3])]).expect("encode");
        tokio::time::timeout(Duration::from_secs(5), async {
            while store.installed_version() < 1 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("installed");
        assert!(!store.needs_install());
        assert_eq!(recorder.0.lock().expect("recorder").as_slice(), &[(1, 1)]);

        cancel.cancel();
        task.await.expect("display loop");
    }
}
