//! Leash Secrets - an in-memory mapping of secret-id to (value, placeholder,
//! activation counter), exposed to the control plane and consumed by the
//! MITM proxy for placeholder substitution (spec.md §4.7).

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod error;
mod vault;

pub use error::{VaultError, VaultResult};
pub use vault::{SecretEntry, SecretVault};

/// Stable prefix every generated placeholder carries, so it is
/// syntactically distinguishable enough to recognize on byte boundaries in
/// textual and compressed bodies (spec.md §3).
pub const PLACEHOLDER_PREFIX: &str = "lsh_secret_";
