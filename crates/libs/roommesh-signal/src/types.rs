use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SignalError;

// ── Participants and addressing ───────────────────────────────────────────────

/// Stable per-participant identifier assigned by the signaling service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParticipantId(pub u32);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Who a message is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// The participant that created the room.
    Coordinator,
    /// One room member.
    Participant(ParticipantId),
    /// Every room member except the sender.
    Others,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomOptions {
    pub max_participants: u8,
}

impl Default for RoomOptions {
    fn default() -> Self {
        Self { max_participants: 4 }
    }
}

// ── Membership events ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinFailure {
    NoSuchRoom,
    RoomFull,
}

impl fmt::Display for JoinFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSuchRoom => f.write_str("no such room"),
            Self::RoomFull => f.write_str("room full"),
        }
    }
}

/// Everything the signaling service tells one participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalEvent {
    Connected,
    Disconnected,
    /// This participant created `room` and is its coordinator. Always
    /// followed by `RoomJoined` for the same room.
    RoomCreated { room: String },
    RoomJoined { room: String, coordinator: Option<ParticipantId> },
    JoinFailed { room: String, reason: JoinFailure },
    Message { from: ParticipantId, message: SignalMessage },
}

// ── Messages ──────────────────────────────────────────────────────────────────

/// Signaling messages exchanged by the sync protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalMessage {
    /// Viewer → coordinator: send me your transfer endpoint.
    RequestPull { requester: ParticipantId },
    /// Scanner → coordinator: fresh geometry is waiting at `endpoint`.
    OfferMesh { endpoint: String },
    /// Coordinator → viewers: the current mesh can be fetched at `endpoint`.
    AnnounceEndpoint { endpoint: String },
}

/// Discriminant used to key handler tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageTag {
    RequestPull,
    OfferMesh,
    AnnounceEndpoint,
}

impl MessageTag {
    pub const ALL: [MessageTag; 3] =
        [MessageTag::RequestPull, MessageTag::OfferMesh, MessageTag::AnnounceEndpoint];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequestPull => "request_pull",
            Self::OfferMesh => "offer_mesh",
            Self::AnnounceEndpoint => "announce_endpoint",
        }
    }
}

impl fmt::Display for MessageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SignalMessage {
    pub fn tag(&self) -> MessageTag {
        match self {
            Self::RequestPull { .. } => MessageTag::RequestPull,
            Self::OfferMesh { .. } => MessageTag::OfferMesh,
            Self::AnnounceEndpoint { .. } => MessageTag::AnnounceEndpoint,
        }
    }

    /// Encode to the MessagePack form carried by the bus.
    pub fn encode(&self) -> Result<Vec<u8>, SignalError> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    pub fn decode(data: &[u8]) -> Result<Self, SignalError> {
        Ok(rmp_serde::from_slice(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_match_variants() {
        let messages = [
            SignalMessage::RequestPull { requester: ParticipantId(3) },
            SignalMessage::OfferMesh { endpoint: "10.0.0.2:25828".into() },
            SignalMessage::AnnounceEndpoint { endpoint: "10.0.0.1:25827".into() },
        ];
        let tags: Vec<_> = messages.iter().map(SignalMessage::tag).collect();
        assert_eq!(tags, MessageTag::ALL.to_vec());
    }

    #[test]
    fn message_survives_wire_form() {
        let msg = SignalMessage::AnnounceEndpoint { endpoint: "192.168.1.20:25827".into() };
        let bytes = msg.encode().expect("encode");
        assert_eq!(SignalMessage::decode(&bytes).expect("decode"), msg);
    }

    #[test]
    fn garbage_does_not_decode() {
        assert!(matches!(
            SignalMessage::decode(&[0xc1, 0x00]),
            Err(SignalError::MsgpackDecode(_))
        ));
    }

    #[test]
    fn participant_display() {
        assert_eq!(ParticipantId(12).to_string(), "#12");
    }
}
