use crate::error::SignalError;
use crate::types::{ParticipantId, RoomOptions, SignalMessage, Target};

/// Outbound half of a participant's connection to the signaling service.
///
/// Calls never block on the service. Each returns once the request is
/// handed off; the outcome (connected, joined, join failed, ...) arrives
/// later as a [`crate::SignalEvent`] on the event stream paired with the
/// channel. An `Err` means the request could not be issued at all.
///
/// Use `Arc<dyn SignalingChannel>` as the handle type.
pub trait SignalingChannel: Send + Sync {
    fn local_id(&self) -> ParticipantId;

    fn is_connected(&self) -> bool;

    fn connect(&self) -> Result<(), SignalError>;

    fn join_room(&self, room: &str) -> Result<(), SignalError>;

    /// Create `room`. Creation is atomic at the service: if the room already
    /// exists the caller observes an ordinary join instead.
    fn create_room(&self, room: &str, options: RoomOptions) -> Result<(), SignalError>;

    fn send(&self, target: Target, message: &SignalMessage) -> Result<(), SignalError>;

    fn disconnect(&self) -> Result<(), SignalError>;
}
