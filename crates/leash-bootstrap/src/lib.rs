//! Leash Bootstrap - the bootstrap coordinator (C10) state machine and the
//! cross-cutting `policy_ready` flag (spec.md §4.8, §4.10).

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod coordinator;
mod error;
mod marker;
mod readiness;

pub use coordinator::{spawn, BootstrapState, DEFAULT_BOOTSTRAP_TIMEOUT};
pub use error::BootstrapError;
pub use marker::{read_marker, BootstrapMarker, MarkerFingerprint};
pub use readiness::PolicyReadiness;
