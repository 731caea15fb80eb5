//! Garden core: transport-agnostic wire contracts and error types.
//!
//! This crate defines the envelope formats shared by the broadcast bus,
//! the realtime port adapters, and the signaling hub. It intentionally
//! carries no transport or runtime dependencies so it can be reused in
//! multiple contexts.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Malformed wire input is reported as `None`/`GardenError`, never as a
//! crash: a hostile or stale peer must not bring down a host.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{GardenError, Result, POLICY_CLOSE_CODE};
