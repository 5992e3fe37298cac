//! Whole-room simulation over an in-process signaling bus.
//!
//! Every participant runs a real orchestrator with real loopback TCP
//! transfers; only signaling and scanning are simulated.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use roommesh_mesh::{Mesh, MeshStore, Transform};
use roommesh_signal::{LocalBus, SignalingChannel};
use tokio::task::JoinHandle;

use crate::config::{DaemonConfig, SyncSettings};
use crate::error::SyncError;
use crate::presenter::LogPresenter;
use crate::repository::{FileMeshRepository, MemoryMeshRepository, MeshRepository};
use crate::role::{DeviceKind, Role};
use crate::scanner::{MeshSource, StaticMeshSource};
use crate::session::SyncState;
use crate::sync::{SyncDeps, SyncHandle, SyncOrchestrator};

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("participant {0} stopped: {1}")]
    Participant(String, SyncError),
}

/// What a finished simulation converged on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationReport {
    pub coordinator_version: u64,
    pub viewer_versions: Vec<u64>,
    pub mesh_bytes: usize,
    pub pushes_served: u64,
}

/// Attach a participant to `bus` and run its orchestrator in the background.
pub fn spawn_on_bus(
    bus: &LocalBus,
    settings: SyncSettings,
    device: DeviceKind,
    repository: Arc<dyn MeshRepository>,
    source: Arc<dyn MeshSource>,
) -> (SyncHandle, JoinHandle<Result<(), SyncError>>) {
    let (channel, events) = bus.attach();
    let channel: Arc<dyn SignalingChannel> = Arc::new(channel);
    let deps = SyncDeps {
        channel,
        store: MeshStore::new(),
        repository,
        source,
        presenter: Arc::new(LogPresenter),
    };
    let orchestrator = SyncOrchestrator::new(settings, device, deps);
    let handle = orchestrator.handle();
    (handle, tokio::spawn(orchestrator.run(events)))
}

/// Fixed room geometry the simulated scanner captures.
pub fn sample_room() -> Vec<Mesh> {
    vec![
        Mesh::cuboid([-2.0, 0.0, -2.0], [2.0, 0.05, 2.0]),
        Mesh::cuboid([-2.0, 0.0, -2.0], [2.0, 2.5, -1.95]),
        Mesh::cuboid([0.5, 0.0, 0.5], [1.2, 0.75, 1.1]),
    ]
}

/// Run a coordinator, `viewers` viewers and optionally one scanner until
/// every viewer displays exactly the coordinator's latest mesh.
pub async fn run_simulation(
    config: &DaemonConfig,
    viewers: usize,
    with_scanner: bool,
    timeout: Duration,
) -> Result<SimulationReport, SimulationError> {
    let coordinator_settings = loopback_settings(config, config.transfer_port)?;
    let peer_settings = loopback_settings(config, 0)?;
    let bus = LocalBus::new();
    let repository: Arc<dyn MeshRepository> =
        Arc::new(FileMeshRepository::new(config.storage_dir.clone()));
    let idle: Arc<dyn MeshSource> = Arc::new(StaticMeshSource::default());

    let mut tasks = Vec::new();
    let (coordinator, task) = spawn_on_bus(
        &bus,
        coordinator_settings,
        DeviceKind::Desktop,
        repository,
        Arc::clone(&idle),
    );
    tasks.push(("coordinator".to_string(), task));
    let entered = coordinator.wait_for_state(SyncState::InRoom(Role::Coordinator));
    within(timeout, "coordinator", entered).await?;

    let mut viewer_handles = Vec::with_capacity(viewers);
    for n in 0..viewers {
        let (viewer, task) = spawn_on_bus(
            &bus,
            peer_settings.clone(),
            DeviceKind::Vive,
            Arc::new(MemoryMeshRepository::new()),
            Arc::clone(&idle),
        );
        tasks.push((format!("viewer {n}"), task));
        let joined = viewer.wait_for_state(SyncState::InRoom(Role::Viewer));
        within(timeout, "viewer join", joined).await?;
        let pulled = viewer.wait_until(|h| h.stats().fetches_completed() > 0);
        within(timeout, "viewer pull", pulled).await?;
        viewer_handles.push(viewer);
    }

    let scanner = if with_scanner {
        let source = StaticMeshSource::new(sample_room())
            .with_pose(Transform::translation(0.0, 0.0, 0.5));
        let before = coordinator.store().latest_version();
        let (scanner, task) = spawn_on_bus(
            &bus,
            peer_settings,
            DeviceKind::HoloLens,
            Arc::new(MemoryMeshRepository::new()),
            Arc::new(source),
        );
        tasks.push(("scanner".to_string(), task));
        let pushed = scanner.wait_until(|h| h.stats().pushes_served() > 0);
        within(timeout, "scanner push", pushed).await?;
        let installed = coordinator.wait_until(|h| h.store().latest_version() > before);
        within(timeout, "coordinator install", installed).await?;
        Some(scanner)
    } else {
        None
    };

    // Store versions are local counters, so convergence is judged on bytes.
    let target = coordinator.store().latest_version();
    let authoritative = coordinator.store().get();
    for viewer in &viewer_handles {
        let converged = |h: &SyncHandle| {
            !h.store().needs_install() && h.store().get().as_bytes() == authoritative.as_bytes()
        };
        within(timeout, "viewer install", viewer.wait_until(converged)).await?;
    }

    let report = SimulationReport {
        coordinator_version: target,
        viewer_versions: viewer_handles.iter().map(|h| h.store().installed_version()).collect(),
        mesh_bytes: authoritative.len(),
        pushes_served: scanner.as_ref().map(|s| s.stats().pushes_served()).unwrap_or(0),
    };

    for viewer in &viewer_handles {
        viewer.stop();
    }
    if let Some(scanner) = &scanner {
        scanner.stop();
    }
    coordinator.stop();
    for (name, task) in tasks {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(SimulationError::Participant(name, err)),
            Err(err) => log::warn!("simulate: {} task failed: {}", name, err),
        }
    }
    Ok(report)
}

fn loopback_settings(config: &DaemonConfig, port: u16) -> Result<SyncSettings, SimulationError> {
    let mut settings = SyncSettings::from_config(config)?;
    let ip = IpAddr::from([127, 0, 0, 1]);
    settings.transfer_addr = SocketAddr::new(ip, port);
    settings.push_addr = SocketAddr::new(ip, 0);
    settings.advertise_host = ip.to_string();
    Ok(settings)
}

async fn within<F: std::future::Future>(
    timeout: Duration,
    what: &'static str,
    fut: F,
) -> Result<F::Output, SimulationError> {
    tokio::time::timeout(timeout, fut).await.map_err(|_| SimulationError::Timeout(what))
}
