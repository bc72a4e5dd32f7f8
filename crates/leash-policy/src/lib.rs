//! Leash Policy - the policy manager (C4), file watcher (C5), and the
//! `PolicyStore` data shape (spec.md §3, §4.3, §4.4) that together own the
//! file/runtime layering, the `active` snapshot publish transaction, and
//! the canonical file's persistence discipline.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod error;
mod manager;
mod store;
mod watcher;

pub use error::{PolicyError, PolicyResult};
pub use manager::{PolicyManager, PublishedSnapshot};
pub use store::{EnforcementMode, Layer, PolicyStore, Snapshot};
pub use watcher::{spawn as spawn_watcher, DEFAULT_DEBOUNCE};
