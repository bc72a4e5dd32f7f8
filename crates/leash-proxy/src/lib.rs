//! Leash Proxy - the transparent MITM proxy (C7): TCP interception, TLS
//! termination via an on-the-fly CA, HTTP header rewrite, secret
//! substitution, and structured request auditing (spec.md §4.6).

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod ca;
mod cert_cache;
mod connect;
mod detect;
mod error;
mod rewrite;
mod server;
mod state;
mod substitute;

pub use ca::CertificateAuthority;
pub use cert_cache::{CertCache, LeafCert};
pub use connect::check as check_connect;
pub use detect::ConnectionKind;
pub use error::{ProxyError, ProxyResult};
pub use rewrite::apply as apply_http_rewrites;
pub use server::{spawn, ProxyHandles};
pub use state::{channel as state_channel, ActiveState, StateReceiver};
pub use substitute::{substitute_body, Encoding};
