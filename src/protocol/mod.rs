//! Protocol module: the binary command codec for the accessory.
//!
//! This module contains the implementations for:
//! - Command construction and range validation
//! - Wire frame encoding and the reverse mapping
//! - Inbound notification decoding

pub mod commands;
pub mod frames;
pub mod notifications;

pub use commands::{ChirpParams, Command, MicParams};
pub use frames::{FrameKind, WireFrame};
pub use notifications::NotificationEvent;
