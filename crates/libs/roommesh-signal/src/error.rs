use crate::types::ParticipantId;

/// Errors returned by signaling operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SignalError {
    #[error("not connected to the signaling service")]
    NotConnected,

    #[error("not in a room")]
    NotInRoom,

    #[error("room has no coordinator")]
    NoCoordinator,

    #[error("unknown participant: {0}")]
    UnknownParticipant(ParticipantId),

    #[error("msgpack decode error: {0}")]
    MsgpackDecode(#[from] rmp_serde::decode::Error),

    #[error("msgpack encode error: {0}")]
    MsgpackEncode(#[from] rmp_serde::encode::Error),
}
