use roommesh_signal::ParticipantId;

use crate::role::{DeviceKind, Role};

/// A participant's role within one signaling session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRole {
    /// Prospective coordinator; becomes `Coordinator` if it ends up creating
    /// the room and `Viewer` if it joins someone else's.
    Provisional,
    Confirmed(Role),
}

impl SessionRole {
    pub fn confirmed(self) -> Option<Role> {
        match self {
            Self::Provisional => None,
            Self::Confirmed(role) => Some(role),
        }
    }
}

/// Where the sync state machine is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Connecting,
    AwaitingRoom,
    InRoom(Role),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("role already confirmed as {current}, refusing {requested}")]
    AlreadyConfirmed { current: Role, requested: Role },
}

/// Role-tagged session. A session lasts from startup (or the last
/// disconnect) to the next disconnect.
#[derive(Debug, Clone)]
pub struct Session {
    id: ParticipantId,
    device: DeviceKind,
    role: SessionRole,
    state: SyncState,
}

impl Session {
    pub fn new(id: ParticipantId, device: DeviceKind) -> Self {
        Self { id, device, role: device.initial_role(), state: SyncState::Idle }
    }

    pub fn id(&self) -> ParticipantId {
        self.id
    }

    pub fn device(&self) -> DeviceKind {
        self.device
    }

    pub fn role(&self) -> SessionRole {
        self.role
    }

    pub fn confirmed_role(&self) -> Option<Role> {
        self.role.confirmed()
    }

    pub fn is_provisional(&self) -> bool {
        self.role == SessionRole::Provisional
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// The one legal role change: provisional to confirmed.
    pub fn confirm(&mut self, role: Role) -> Result<Role, SessionError> {
        match self.role {
            SessionRole::Provisional => {
                log::info!("session({}): confirmed as {}", self.id, role);
                self.role = SessionRole::Confirmed(role);
                Ok(role)
            }
            SessionRole::Confirmed(current) => {
                Err(SessionError::AlreadyConfirmed { current, requested: role })
            }
        }
    }

    pub fn transition(&mut self, to: SyncState) {
        if self.state != to {
            log::debug!("session({}): {:?} -> {:?}", self.id, self.state, to);
            self.state = to;
        }
    }

    /// End the session: back to `Idle` with the device's starting role.
    pub fn reset(&mut self) {
        self.transition(SyncState::Idle);
        self.role = self.device.initial_role();
    }
}
