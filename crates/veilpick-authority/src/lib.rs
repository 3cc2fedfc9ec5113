//! Verifying authority for anonymous package pickup: lifecycle state
//! machine, one-time nullifier consumption, and configuration.

#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod config;
pub mod lifecycle;
pub mod nullifier;

pub use config::AuthorityConfig;
pub use lifecycle::{PackageAuthority, PackageRegistration};
pub use nullifier::{MemoryNullifierStore, NullifierStore, SledNullifierStore};
