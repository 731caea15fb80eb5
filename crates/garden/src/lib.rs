//! Top-level facade crate for Garden realtime.
//!
//! Re-exports the protocol core, the realtime adapters, and the
//! signaling hub so users can depend on a single crate.

pub mod core {
    pub use garden_core::*;
}

pub mod realtime {
    pub use garden_realtime::*;
}

pub mod hub {
    pub use garden_hub::*;
}
