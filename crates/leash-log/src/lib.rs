//! Leash Log - the shared, append-only structured event sink (spec.md §2
//! C9). Distinct from `tracing`'s developer-facing diagnostic logs: this is
//! the audit trail of policy updates, kernel decisions, and proxy requests
//! that the control plane streams to `events.log` and to WebSocket clients.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod event;
mod logger;
mod ring;

pub use event::Event;
pub use logger::{Logger, LoggerHandle};
pub use ring::RingBuffer;

/// Default capacity of the in-memory replay ring buffer (spec.md §5:
/// "a fixed capacity (default 10000); oldest events are overwritten").
pub const DEFAULT_RING_CAPACITY: usize = 10_000;

/// Default bounded capacity of a single WebSocket client's send queue
/// (spec.md §5: "a bounded per-client send queue; slow consumers are
/// disconnected rather than allowed to stall publishers").
pub const DEFAULT_CLIENT_QUEUE_CAPACITY: usize = 256;
