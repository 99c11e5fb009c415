//! BLE communication module.
//!
//! Provides the btleplug-backed transport implementation and the default
//! service identifiers.

pub mod transport;
pub mod uuids;

pub use transport::BleTransport;
pub use uuids::*;
