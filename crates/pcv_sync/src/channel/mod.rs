//! Realtime channel: one WebSocket per editor session.
//!
//! * [`events`] - push envelope decoding
//! * [`status`] - connection status state machine
//! * [`socket`] - the socket task and its reconnect handle
//!
//! Applying push events to the store lives in [`crate::engine`].

pub mod events;
pub mod socket;
pub mod status;

pub use events::PushEvent;
pub use socket::{ChannelEvent, ChannelEventKind, RealtimeChannel};
pub use status::ChannelStatus;
