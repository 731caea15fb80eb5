//! Garden signaling hub library entry.
//!
//! The hub is deliberately thin: it tracks circle membership and relays
//! SDP/ICE text between peers. It never inspects negotiation payloads
//! and holds no state beyond live connections. This crate is consumed
//! by the binary (`main.rs`) and by integration tests.

pub mod app_state;
pub mod config;
pub mod policy;
pub mod router;
pub mod server;
pub mod state;
pub mod transport;

pub use server::{start, Hub};
