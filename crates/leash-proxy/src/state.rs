//! The proxy's view of "currently active" policy, pushed in by whoever owns
//! publication (the manager binary), never pulled. Keeping this shape local
//! to `leash-proxy` — rather than depending on `leash-policy`'s own
//! `PublishedSnapshot` — avoids the cyclic-reference pattern spec.md §9
//! flags for re-architecture: the proxy holds no back-pointer to the
//! policy manager, only a receiver of whatever it last published.

use leash_core::{HttpRewriteRule, PolicySet};
use tokio::sync::watch;

/// The connect policy and HTTP rewrite rules currently in force.
#[derive(Debug, Clone, Default)]
pub struct ActiveState {
    /// Active connect/open/exec/mcp rules.
    pub policy: PolicySet,
    /// Active HTTP header rewrite rules.
    pub http_rewrites: Vec<HttpRewriteRule>,
}

/// The receiving half the proxy holds; the sending half lives with whatever
/// publishes snapshots.
pub type StateReceiver = watch::Receiver<ActiveState>;

/// Construct a channel seeded with an empty (fail-closed) state.
#[must_use]
pub fn channel() -> (watch::Sender<ActiveState>, StateReceiver) {
    watch::channel(ActiveState::default())
}
