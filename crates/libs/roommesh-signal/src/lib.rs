//! Signaling boundary for roommesh.
//!
//! The signaling service is a black-box pub/sub group membership service.
//! This crate pins down the part of it the sync protocol relies on:
//!
//! - **Membership events** ([`SignalEvent`]): connected, room created, room
//!   joined, join failed, disconnected, inbound message
//! - **Tagged messages**: [`SignalMessage`], dispatched by [`MessageTag`]
//!   and carried as MessagePack on the wire
//! - **[`SignalingChannel`]** is the outbound half: connect, join, create,
//!   send, disconnect. Outcomes come back as events, never as return values.
//! - **[`LocalBus`]**: an in-process implementation with atomic room
//!   creation, used by the simulator and the tests
//!
//! # Ordering
//!
//! Events for one participant are delivered in the order the bus produced
//! them. Nothing is acknowledged; delivery is at-most-once.

pub mod channel;
pub mod error;
pub mod local;
pub mod types;

pub use channel::SignalingChannel;
pub use error::SignalError;
pub use local::{EventReceiver, EventSender, LocalBus, LocalChannel};
pub use types::*;
