//! The signaling-driven sync state machine.
//!
//! ```text
//! Idle -> Connecting -> AwaitingRoom -> InRoom{role}
//!   ^                                        |
//!   +------------- disconnected -------------+
//! ```
//!
//! Membership events move the state machine; signaling messages are
//! dispatched through a handler table keyed by [`MessageTag`]. Every
//! transfer runs on its own task, so the event loop never waits on a peer.
//!
//! Room resources (the coordinator's standing server, the announce watcher,
//! the viewer display loop, in-flight fetches) hang off a per-room
//! cancellation token and are abandoned together on disconnect. The mesh
//! store keeps whatever it last installed.

mod handlers;
mod status;

pub use status::{SyncHandle, SyncStats, SyncStatus};

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use roommesh_mesh::{MeshBlob, MeshStore};
use roommesh_signal::{
    JoinFailure, MessageTag, ParticipantId, SignalEvent, SignalMessage, SignalingChannel, Target,
};
use roommesh_transfer::{ServerHandle, TransferClient, TransferEndpoint, TransferServer};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::config::SyncSettings;
use crate::error::SyncError;
use crate::presenter::{spawn_display_loop, MeshPresenter};
use crate::repository::MeshRepository;
use crate::role::{DeviceKind, Role};
use crate::scanner::MeshSource;
use crate::session::{Session, SyncState};

/// External collaborators injected into an orchestrator.
#[derive(Clone)]
pub struct SyncDeps {
    pub channel: Arc<dyn SignalingChannel>,
    pub store: MeshStore,
    pub repository: Arc<dyn MeshRepository>,
    pub source: Arc<dyn MeshSource>,
    pub presenter: Arc<dyn MeshPresenter>,
}

/// Resources that live exactly as long as room membership.
struct RoomContext {
    cancel: CancellationToken,
    server: Option<ServerHandle>,
}

/// Orders announcement-triggered fetches: only the fetch started by the
/// most recently received announcement may install.
#[derive(Debug, Default)]
pub(crate) struct AnnounceGate {
    latest: Mutex<u64>,
}

impl AnnounceGate {
    pub(crate) fn next(&self) -> u64 {
        let mut latest = self.lock();
        *latest += 1;
        *latest
    }

    /// Replace the store's blob if `seq` is still the newest announcement.
    pub(crate) fn install_if_current(
        &self,
        seq: u64,
        store: &MeshStore,
        blob: MeshBlob,
    ) -> Option<u64> {
        let latest = self.lock();
        if *latest != seq {
            return None;
        }
        Some(store.replace(blob))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, u64> {
        self.latest.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub(crate) type Handler =
    fn(&mut SyncOrchestrator, ParticipantId, SignalMessage) -> Result<(), SyncError>;

pub struct SyncOrchestrator {
    settings: SyncSettings,
    session: Session,
    channel: Arc<dyn SignalingChannel>,
    store: MeshStore,
    repository: Arc<dyn MeshRepository>,
    source: Arc<dyn MeshSource>,
    presenter: Arc<dyn MeshPresenter>,
    client: TransferClient,
    handlers: HashMap<MessageTag, Handler>,
    gate: Arc<AnnounceGate>,
    room: Option<RoomContext>,
    held_coordinator: bool,
    status: watch::Sender<SyncStatus>,
    handle: SyncHandle,
}

impl SyncOrchestrator {
    pub fn new(settings: SyncSettings, device: DeviceKind, deps: SyncDeps) -> Self {
        let session = Session::new(deps.channel.local_id(), device);
        let (status, status_rx) =
            watch::channel(SyncStatus { state: session.state(), role: session.role() });
        let handle = SyncHandle {
            id: session.id(),
            status: status_rx,
            store: deps.store.clone(),
            stats: Arc::default(),
            stop: CancellationToken::new(),
        };
        Self {
            client: TransferClient::with_timeout(settings.fetch_timeout),
            settings,
            session,
            channel: deps.channel,
            store: deps.store,
            repository: deps.repository,
            source: deps.source,
            presenter: deps.presenter,
            handlers: handlers::table(),
            gate: Arc::default(),
            room: None,
            held_coordinator: false,
            status,
            handle,
        }
    }

    pub fn handle(&self) -> SyncHandle {
        self.handle.clone()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Drive the state machine from `events` until the stream ends or the
    /// handle asks to stop, then shut down.
    pub async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<SignalEvent>,
    ) -> Result<(), SyncError> {
        let stop = self.handle.stop.clone();
        let mut result = self.start();
        if result.is_ok() {
            result = loop {
                tokio::select! {
                    _ = stop.cancelled() => break Ok(()),
                    event = events.recv() => {
                        let Some(event) = event else {
                            break Ok(());
                        };
                        if let Err(err) = self.handle_event(event).await {
                            if err.is_fatal() {
                                log::error!("sync({}): {}", self.session.id(), err);
                                break Err(err);
                            }
                            log::warn!("sync({}): {}", self.session.id(), err);
                        }
                    }
                }
            };
        }
        self.shutdown().await;
        result
    }

    /// `Idle -> Connecting`, or straight to `AwaitingRoom` if the channel is
    /// already connected.
    pub fn start(&mut self) -> Result<(), SyncError> {
        self.set_state(SyncState::Connecting);
        if self.channel.is_connected() {
            self.request_join()
        } else {
            self.channel.connect()?;
            Ok(())
        }
    }

    pub async fn handle_event(&mut self, event: SignalEvent) -> Result<(), SyncError> {
        match event {
            SignalEvent::Connected => {
                if self.session.state() == SyncState::Connecting {
                    self.request_join()?;
                }
                Ok(())
            }
            SignalEvent::Disconnected => {
                log::info!("sync({}): disconnected from signaling", self.session.id());
                self.leave_room();
                self.session.reset();
                self.publish();
                Ok(())
            }
            SignalEvent::RoomCreated { room } => self.on_room_created(&room).await,
            SignalEvent::RoomJoined { room, coordinator } => {
                self.on_room_joined(&room, coordinator).await
            }
            SignalEvent::JoinFailed { room, reason } => self.on_join_failed(&room, reason),
            SignalEvent::Message { from, message } => {
                let tag = message.tag();
                match self.handlers.get(&tag).copied() {
                    Some(handler) => handler(self, from, message),
                    None => {
                        log::debug!("sync({}): no handler for {}", self.session.id(), tag);
                        Ok(())
                    }
                }
            }
        }
    }

    /// Persist the coordinator's mesh and release room resources.
    ///
    /// A process that held the coordinator role in this run saves even if a
    /// signaling disconnect has since reset its session.
    pub async fn shutdown(&mut self) {
        if self.held_coordinator {
            if let Err(err) = self.persist().await {
                log::warn!("sync({}): couldn't save mesh: {}", self.session.id(), err);
            }
        }
        if let Some(room) = self.room.take() {
            room.cancel.cancel();
            if let Some(server) = room.server {
                server.shutdown().await;
            }
        }
        if self.channel.is_connected() {
            let _ = self.channel.disconnect();
        }
        self.session.transition(SyncState::Idle);
        self.publish();
    }

    async fn persist(&self) -> Result<(), SyncError> {
        if self.store.get().is_empty() {
            return Ok(());
        }
        let meshes = self.store.meshes()?;
        self.repository.save(&self.settings.mesh_name, &meshes).await?;
        Ok(())
    }

    // ── membership ────────────────────────────────────────────────────────

    fn request_join(&mut self) -> Result<(), SyncError> {
        self.set_state(SyncState::AwaitingRoom);
        log::info!("sync({}): joining <{}>", self.session.id(), self.settings.room_name);
        self.channel.join_room(&self.settings.room_name)?;
        Ok(())
    }

    async fn on_room_created(&mut self, room: &str) -> Result<(), SyncError> {
        if self.session.is_provisional() {
            self.session.confirm(Role::Coordinator)?;
            self.publish();
        }
        log::info!("sync({}): created <{}>", self.session.id(), room);
        let server = TransferServer::bind(self.settings.transfer_addr, self.store.clone()).await?;
        self.room_context().server = Some(server.spawn());
        Ok(())
    }

    async fn on_room_joined(
        &mut self,
        room: &str,
        coordinator: Option<ParticipantId>,
    ) -> Result<(), SyncError> {
        let own_room = coordinator == Some(self.session.id());
        if self.session.is_provisional() {
            self.session.confirm(if own_room { Role::Coordinator } else { Role::Viewer })?;
        }
        let Some(role) = self.session.confirmed_role() else {
            return Ok(());
        };
        if role == Role::Coordinator && !own_room {
            log::warn!(
                "sync({}): joined <{}> owned by another coordinator",
                self.session.id(),
                room
            );
        }
        self.held_coordinator = role == Role::Coordinator;
        self.set_state(SyncState::InRoom(role));
        log::info!("sync({}): joined <{}> as {}", self.session.id(), room, role);

        match role {
            Role::Coordinator => self.enter_as_coordinator().await,
            Role::Scanner => self.enter_as_scanner(),
            Role::Viewer => self.enter_as_viewer(),
        }
    }

    fn on_join_failed(&mut self, room: &str, reason: JoinFailure) -> Result<(), SyncError> {
        if self.session.is_provisional() && reason == JoinFailure::NoSuchRoom {
            log::info!(
                "sync({}): join <{}> failed ({}), creating it as coordinator",
                self.session.id(),
                room,
                reason
            );
            self.channel.create_room(room, self.settings.room_options)?;
            return Ok(());
        }
        log::info!("sync({}): server not found ({}), disconnecting", self.session.id(), reason);
        self.leave_room();
        self.session.reset();
        self.publish();
        self.channel.disconnect()?;
        Ok(())
    }

    // ── role entry ────────────────────────────────────────────────────────

    async fn enter_as_coordinator(&mut self) -> Result<(), SyncError> {
        if let Err(err) = self.load_persisted().await {
            log::warn!("sync({}): couldn't load mesh: {}", self.session.id(), err);
        }
        let Some(endpoint) = self.coordinator_endpoint() else {
            log::warn!("sync({}): coordinator has no transfer server", self.session.id());
            return Ok(());
        };
        let cancel = self.room_context().cancel.child_token();
        let channel = Arc::clone(&self.channel);
        spawn_announcer(self.session.id(), self.store.clone(), channel, endpoint, cancel);
        Ok(())
    }

    async fn load_persisted(&self) -> Result<(), SyncError> {
        let meshes = self.repository.load(&self.settings.mesh_name).await?;
        if meshes.is_empty() {
            log::info!("sync({}): no stored mesh, starting empty", self.session.id());
            return Ok(());
        }
        let version = self.store.replace_meshes(&meshes)?;
        log::info!(
            "sync({}): loaded {} stored meshes as v{}",
            self.session.id(),
            meshes.len(),
            version
        );
        Ok(())
    }

    fn enter_as_scanner(&mut self) -> Result<(), SyncError> {
        let push = ScannerPush {
            id: self.session.id(),
            source: Arc::clone(&self.source),
            store: self.store.clone(),
            channel: Arc::clone(&self.channel),
            push_addr: self.settings.push_addr,
            advertise_host: self.settings.advertise_host.clone(),
            stats: Arc::clone(&self.handle.stats),
        };
        let cancel = self.room_context().cancel.child_token();
        tokio::spawn(async move {
            let id = push.id;
            if let Err(err) = push.run(cancel).await {
                log::warn!("sync({}): push failed: {}", id, err);
            }
        });
        Ok(())
    }

    fn enter_as_viewer(&mut self) -> Result<(), SyncError> {
        let cancel = self.room_context().cancel.child_token();
        spawn_display_loop(self.store.clone(), Arc::clone(&self.presenter), cancel);
        let requester = self.session.id();
        self.channel.send(Target::Coordinator, &SignalMessage::RequestPull { requester })?;
        Ok(())
    }

    // ── helpers ───────────────────────────────────────────────────────────

    fn in_role(&self, role: Role) -> bool {
        self.session.state() == SyncState::InRoom(role)
    }

    fn room_context(&mut self) -> &mut RoomContext {
        self.room
            .get_or_insert_with(|| RoomContext { cancel: CancellationToken::new(), server: None })
    }

    fn room_cancel(&self) -> Option<CancellationToken> {
        self.room.as_ref().map(|room| room.cancel.child_token())
    }

    fn coordinator_endpoint(&self) -> Option<TransferEndpoint> {
        self.room
            .as_ref()
            .and_then(|room| room.server.as_ref())
            .map(|server| server.endpoint(&self.settings.advertise_host))
    }

    /// Abandon room resources. In-flight transfers are cancelled, not rolled
    /// back.
    fn leave_room(&mut self) {
        if let Some(room) = self.room.take() {
            room.cancel.cancel();
        }
    }

    fn set_state(&mut self, state: SyncState) {
        self.session.transition(state);
        self.publish();
    }

    fn publish(&self) {
        let status = SyncStatus { state: self.session.state(), role: self.session.role() };
        self.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }
}

/// One capture-and-offer round of a scanner.
struct ScannerPush {
    id: ParticipantId,
    source: Arc<dyn MeshSource>,
    store: MeshStore,
    channel: Arc<dyn SignalingChannel>,
    push_addr: SocketAddr,
    advertise_host: String,
    stats: Arc<SyncStats>,
}

impl ScannerPush {
    async fn run(self, cancel: CancellationToken) -> Result<(), SyncError> {
        let meshes = self.source.capture().await?;
        self.store.replace_meshes(&meshes)?;
        let server = TransferServer::bind(self.push_addr, self.store).await?;
        let endpoint = server.endpoint(&self.advertise_host).to_string();
        log::info!("sync({}): offering {} meshes at <{}>", self.id, meshes.len(), endpoint);
        self.channel.send(Target::Coordinator, &SignalMessage::OfferMesh { endpoint })?;
        tokio::select! {
            _ = cancel.cancelled() => {
                log::debug!("sync({}): push abandoned", self.id);
            }
            served = server.serve_once() => {
                served?;
                self.stats.record_push();
            }
        }
        Ok(())
    }
}

/// Re-announce the coordinator endpoint to everyone else whenever the
/// store's latest version moves.
fn spawn_announcer(
    id: ParticipantId,
    store: MeshStore,
    channel: Arc<dyn SignalingChannel>,
    endpoint: TransferEndpoint,
    cancel: CancellationToken,
) {
    let mut changes = store.subscribe();
    changes.borrow_and_update();
    let endpoint = endpoint.to_string();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let version = changes.borrow_and_update().version;
                    log::info!("sync({}): mesh now v{}, announcing <{}>", id, version, endpoint);
                    let announce = SignalMessage::AnnounceEndpoint { endpoint: endpoint.clone() };
                    if let Err(err) = channel.send(Target::Others, &announce) {
                        log::warn!("sync({}): announce not sent: {}", id, err);
                    }
                }
            }
        }
    });
}
