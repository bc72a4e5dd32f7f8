//! Leash Core - Canonical rule model shared by the compiler, policy manager,
//! kernel shim, and MITM proxy.
//!
//! This crate defines the in-memory shapes that every other crate agrees on:
//! [`Rule`] (the tagged Open/Exec/Connect/Mcp sum), [`PolicySet`] (ordered
//! rule sequences plus the connect default flags), and [`HttpRewriteRule`].
//! Everything here is immutable once constructed; "mutation" always produces
//! a new value.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod error;
mod http;
mod policy_set;
mod rule;

pub use error::{CoreError, CoreResult};
pub use http::HttpRewriteRule;
pub use policy_set::PolicySet;
pub use rule::{Action, ConnectRule, ExecRule, McpRule, OpenMode, OpenRule, Operation, Rule};

/// Maximum byte length of a bounded `path`/`hostname` buffer shipped to the
/// kernel shim. Kept small and fixed so the structure is directly shippable
/// across the kernel boundary, per spec.
pub const MAX_BOUNDED_LEN: usize = 4096;

/// A fixed-capacity byte buffer with an explicit length, matching the
/// "bounded byte buffer with explicit length" shape spec.md calls for on
/// `path` and `hostname` fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct BoundedBuf {
    bytes: Vec<u8>,
}

impl BoundedBuf {
    /// Construct a bounded buffer, truncating to [`MAX_BOUNDED_LEN`] bytes.
    ///
    /// Truncation rather than rejection matches the kernel shim's layout
    /// constraint: a path that does not fit a fixed-size table entry simply
    /// cannot be represented there, so truncating at construction keeps the
    /// representation total instead of introducing a fallible constructor
    /// every call site must handle.
    #[must_use]
    pub fn new(s: impl AsRef<str>) -> Self {
        let mut bytes = s.as_ref().as_bytes().to_vec();
        bytes.truncate(MAX_BOUNDED_LEN);
        Self { bytes }
    }

    /// Borrow the buffer as a UTF-8 string, lossily if truncation split a
    /// multi-byte character.
    #[must_use]
    pub fn as_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    /// Number of bytes currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Display for BoundedBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl<S: AsRef<str>> From<S> for BoundedBuf {
    fn from(s: S) -> Self {
        Self::new(s)
    }
}

/// Normalize a filesystem path for rule matching: collapse to `/`-separated
/// boundaries and trim a trailing slash (except for the root).
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let mut normalized = path.replace('\\', "/");
    while normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }
    if normalized.is_empty() {
        "/".to_string()
    } else {
        normalized
    }
}

/// Normalize a hostname for rule matching: lower-case and trim whitespace.
#[must_use]
pub fn normalize_hostname(host: &str) -> String {
    host.trim().to_ascii_lowercase()
}

/// Canonicalize a packed IPv4 address to dotted-quad form.
#[must_use]
pub fn canonical_ipv4(addr: u32) -> String {
    std::net::Ipv4Addr::from(addr).to_string()
}
