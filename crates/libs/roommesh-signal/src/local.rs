use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;

use crate::channel::SignalingChannel;
use crate::error::SignalError;
use crate::types::*;

pub type EventSender = mpsc::UnboundedSender<SignalEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<SignalEvent>;

/// In-process signaling service.
///
/// All state sits behind one lock, which makes room creation atomic: of
/// several participants racing to create the same room, exactly one becomes
/// its coordinator and the rest observe a join. Messages are pushed through
/// their MessagePack form on the way to each recipient.
#[derive(Clone, Default)]
pub struct LocalBus {
    hub: Arc<Mutex<Hub>>,
}

#[derive(Default)]
struct Hub {
    next_id: u32,
    peers: HashMap<ParticipantId, Peer>,
    rooms: HashMap<String, Room>,
}

struct Peer {
    events: EventSender,
    connected: bool,
    room: Option<String>,
}

struct Room {
    coordinator: Option<ParticipantId>,
    members: BTreeSet<ParticipantId>,
    max_participants: u8,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new participant. It starts disconnected.
    pub fn attach(&self) -> (LocalChannel, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut hub = lock(&self.hub);
        hub.next_id += 1;
        let id = ParticipantId(hub.next_id);
        hub.peers.insert(id, Peer { events: tx, connected: false, room: None });
        log::trace!("local_bus: attached {}", id);
        (LocalChannel { id, hub: Arc::clone(&self.hub) }, rx)
    }

    /// Service-side disconnect of one participant. Returns `false` if it was
    /// not connected.
    pub fn drop_participant(&self, id: ParticipantId) -> bool {
        let mut hub = lock(&self.hub);
        hub.disconnect(id)
    }

    pub fn room_members(&self, room: &str) -> Vec<ParticipantId> {
        let hub = lock(&self.hub);
        hub.rooms.get(room).map(|r| r.members.iter().copied().collect()).unwrap_or_default()
    }

    pub fn coordinator_of(&self, room: &str) -> Option<ParticipantId> {
        let hub = lock(&self.hub);
        hub.rooms.get(room).and_then(|r| r.coordinator)
    }
}

// A poisoned hub only means another participant panicked mid-update; the
// maps are still structurally valid.
fn lock(hub: &Mutex<Hub>) -> MutexGuard<'_, Hub> {
    hub.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Hub {
    fn emit(&self, id: ParticipantId, event: SignalEvent) {
        if let Some(peer) = self.peers.get(&id) {
            let _ = peer.events.send(event);
        }
    }

    fn peer(&self, id: ParticipantId) -> Result<&Peer, SignalError> {
        self.peers.get(&id).ok_or(SignalError::UnknownParticipant(id))
    }

    fn require_connected(&self, id: ParticipantId) -> Result<(), SignalError> {
        if self.peer(id)?.connected {
            Ok(())
        } else {
            Err(SignalError::NotConnected)
        }
    }

    fn leave_room(&mut self, id: ParticipantId) {
        let Some(name) = self.peers.get_mut(&id).and_then(|peer| peer.room.take()) else {
            return;
        };
        let Some(room) = self.rooms.get_mut(&name) else {
            return;
        };
        room.members.remove(&id);
        if room.coordinator == Some(id) {
            log::info!("local_bus: coordinator {} left <{}>", id, name);
            room.coordinator = None;
        }
        if room.members.is_empty() {
            self.rooms.remove(&name);
            log::debug!("local_bus: closed empty room <{}>", name);
        }
    }

    fn disconnect(&mut self, id: ParticipantId) -> bool {
        let was_connected = match self.peers.get_mut(&id) {
            Some(peer) => std::mem::replace(&mut peer.connected, false),
            None => return false,
        };
        if !was_connected {
            return false;
        }
        self.leave_room(id);
        self.emit(id, SignalEvent::Disconnected);
        true
    }

    fn join(&mut self, id: ParticipantId, name: &str) {
        let room_full = match self.rooms.get(name) {
            None => {
                self.emit(
                    id,
                    SignalEvent::JoinFailed {
                        room: name.to_string(),
                        reason: JoinFailure::NoSuchRoom,
                    },
                );
                return;
            }
            Some(room) => {
                !room.members.contains(&id) && room.members.len() >= room.max_participants as usize
            }
        };
        if room_full {
            self.emit(
                id,
                SignalEvent::JoinFailed { room: name.to_string(), reason: JoinFailure::RoomFull },
            );
            return;
        }

        if self.peers.get(&id).and_then(|p| p.room.as_deref()) != Some(name) {
            self.leave_room(id);
        }
        let coordinator = match self.rooms.get_mut(name) {
            Some(room) => {
                room.members.insert(id);
                room.coordinator
            }
            None => return,
        };
        if let Some(peer) = self.peers.get_mut(&id) {
            peer.room = Some(name.to_string());
        }
        log::debug!("local_bus: {} joined <{}>", id, name);
        self.emit(id, SignalEvent::RoomJoined { room: name.to_string(), coordinator });
    }

    fn create(&mut self, id: ParticipantId, name: &str, options: RoomOptions) {
        if self.rooms.contains_key(name) {
            log::debug!("local_bus: <{}> already exists, {} joins instead", name, id);
            self.join(id, name);
            return;
        }
        self.leave_room(id);
        let mut members = BTreeSet::new();
        members.insert(id);
        self.rooms.insert(
            name.to_string(),
            Room {
                coordinator: Some(id),
                members,
                max_participants: options.max_participants.max(1),
            },
        );
        if let Some(peer) = self.peers.get_mut(&id) {
            peer.room = Some(name.to_string());
        }
        log::info!("local_bus: {} created <{}>", id, name);
        self.emit(id, SignalEvent::RoomCreated { room: name.to_string() });
        self.emit(id, SignalEvent::RoomJoined { room: name.to_string(), coordinator: Some(id) });
    }

    fn recipients(
        &self,
        from: ParticipantId,
        target: Target,
    ) -> Result<Vec<ParticipantId>, SignalError> {
        let name = self.peer(from)?.room.as_deref().ok_or(SignalError::NotInRoom)?;
        let room = self.rooms.get(name).ok_or(SignalError::NotInRoom)?;
        match target {
            Target::Coordinator => {
                room.coordinator.map(|c| vec![c]).ok_or(SignalError::NoCoordinator)
            }
            Target::Participant(to) if room.members.contains(&to) => Ok(vec![to]),
            Target::Participant(to) => Err(SignalError::UnknownParticipant(to)),
            Target::Others => Ok(room.members.iter().copied().filter(|m| *m != from).collect()),
        }
    }
}

/// One participant's handle on a [`LocalBus`].
pub struct LocalChannel {
    id: ParticipantId,
    hub: Arc<Mutex<Hub>>,
}

impl SignalingChannel for LocalChannel {
    fn local_id(&self) -> ParticipantId {
        self.id
    }

    fn is_connected(&self) -> bool {
        let hub = lock(&self.hub);
        hub.peers.get(&self.id).map(|p| p.connected).unwrap_or(false)
    }

    fn connect(&self) -> Result<(), SignalError> {
        let mut hub = lock(&self.hub);
        let peer = hub.peers.get_mut(&self.id).ok_or(SignalError::UnknownParticipant(self.id))?;
        if peer.connected {
            return Ok(());
        }
        peer.connected = true;
        hub.emit(self.id, SignalEvent::Connected);
        Ok(())
    }

    fn join_room(&self, room: &str) -> Result<(), SignalError> {
        let mut hub = lock(&self.hub);
        hub.require_connected(self.id)?;
        hub.join(self.id, room);
        Ok(())
    }

    fn create_room(&self, room: &str, options: RoomOptions) -> Result<(), SignalError> {
        let mut hub = lock(&self.hub);
        hub.require_connected(self.id)?;
        hub.create(self.id, room, options);
        Ok(())
    }

    fn send(&self, target: Target, message: &SignalMessage) -> Result<(), SignalError> {
        let hub = lock(&self.hub);
        hub.require_connected(self.id)?;
        let recipients = hub.recipients(self.id, target)?;
        let wire = message.encode()?;
        log::trace!(
            "local_bus: {} -> {:?} {} ({} bytes, {} recipients)",
            self.id,
            target,
            message.tag(),
            wire.len(),
            recipients.len()
        );
        for to in recipients {
            let message = SignalMessage::decode(&wire)?;
            hub.emit(to, SignalEvent::Message { from: self.id, message });
        }
        Ok(())
    }

    fn disconnect(&self) -> Result<(), SignalError> {
        let mut hub = lock(&self.hub);
        hub.disconnect(self.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut EventReceiver) -> Vec<SignalEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn join_before_connect_is_rejected() {
        let bus = LocalBus::new();
        let (channel, _rx) = bus.attach();
        assert!(matches!(channel.join_room("r"), Err(SignalError::NotConnected)));
    }

    #[test]
    fn connect_is_idempotent() {
        let bus = LocalBus::new();
        let (channel, mut rx) = bus.attach();
        channel.connect().expect("connect");
        channel.connect().expect("connect again");
        assert_eq!(drain(&mut rx), vec![SignalEvent::Connected]);
        assert!(channel.is_connected());
    }

    #[test]
    fn missing_room_fails_join() {
        let bus = LocalBus::new();
        let (channel, mut rx) = bus.attach();
        channel.connect().expect("connect");
        channel.join_room("lab").expect("join");
        assert_eq!(
            drain(&mut rx),
            vec![
                SignalEvent::Connected,
                SignalEvent::JoinFailed { room: "lab".into(), reason: JoinFailure::NoSuchRoom },
            ]
        );
    }

    #[test]
    fn creator_sees_created_then_joined() {
        let bus = LocalBus::new();
        let (channel, mut rx) = bus.attach();
        channel.connect().expect("connect");
        channel.create_room("lab", RoomOptions::default()).expect("create");
        let id = channel.local_id();
        assert_eq!(
            drain(&mut rx),
            vec![
                SignalEvent::Connected,
                SignalEvent::RoomCreated { room: "lab".into() },
                SignalEvent::RoomJoined { room: "lab".into(), coordinator: Some(id) },
            ]
        );
        assert_eq!(bus.coordinator_of("lab"), Some(id));
    }

    #[test]
    fn full_room_rejects_join() {
        let bus = LocalBus::new();
        let (owner, _owner_rx) = bus.attach();
        owner.connect().expect("connect");
        owner.create_room("lab", RoomOptions { max_participants: 1 }).expect("create");

        let (late, mut late_rx) = bus.attach();
        late.connect().expect("connect");
        late.join_room("lab").expect("join");
        assert_eq!(
            drain(&mut late_rx).last(),
            Some(&SignalEvent::JoinFailed { room: "lab".into(), reason: JoinFailure::RoomFull })
        );
    }

    #[test]
    fn coordinator_leaving_clears_coordinator() {
        let bus = LocalBus::new();
        let (owner, _owner_rx) = bus.attach();
        owner.connect().expect("connect");
        owner.create_room("lab", RoomOptions::default()).expect("create");
        let (member, _member_rx) = bus.attach();
        member.connect().expect("connect");
        member.join_room("lab").expect("join");

        owner.disconnect().expect("disconnect");
        assert_eq!(bus.coordinator_of("lab"), None);
        assert_eq!(bus.room_members("lab"), vec![member.local_id()]);
        let request = SignalMessage::RequestPull { requester: member.local_id() };
        assert!(matches!(
            member.send(Target::Coordinator, &request),
            Err(SignalError::NoCoordinator)
        ));
    }

    #[test]
    fn drop_participant_emits_disconnect() {
        let bus = LocalBus::new();
        let (channel, mut rx) = bus.attach();
        channel.connect().expect("connect");
        assert!(bus.drop_participant(channel.local_id()));
        assert!(!bus.drop_participant(channel.local_id()));
        assert_eq!(drain(&mut rx), vec![SignalEvent::Connected, SignalEvent::Disconnected]);
        assert!(!channel.is_connected());
    }
}
