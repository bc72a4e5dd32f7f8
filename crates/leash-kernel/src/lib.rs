//! Leash Kernel - the client-side contract with the in-kernel enforcement
//! program (spec.md §4.5). The BPF/LSM program itself is out of scope; this
//! crate only marshals rule tables into the kernel's expected layout,
//! re-uploads on every publish, and classifies upload failures into soft
//! (tolerated) vs hard (rolled back) per spec.md §4.3/§4.11.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod error;
mod shim;
mod tables;

pub use error::{ShimError, ShimErrorClass};
pub use shim::{AuditEvent, AuditOutcome, KernelShim, NullShim};
pub use tables::RuleTables;
