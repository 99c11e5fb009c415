// Allow holding locks across await points - we use parking_lot which is designed for this
#![allow(clippy::await_holding_lock)]
// Allow unusual byte groupings for UUIDs which have standard format
#![allow(clippy::unusual_byte_groupings)]

//! # otobuds-ble
//!
//! A cross-platform Rust library for controlling Otobuds acoustic test
//! earbuds via Bluetooth Low Energy.
//!
//! The accessory exposes a UART-like service over BLE. This library drives
//! the full session lifecycle (scan, connect, service resolution,
//! notification subscription) and speaks the device's binary command
//! protocol: chirp playback, chirp configuration, microphone capture
//! configuration, and battery reports.
//!
//! ## Features
//!
//! - **Device Discovery**: Scan for nearby accessories with name and RSSI
//! - **Session State Machine**: Explicit phases with guarded transitions
//! - **Binary Command Protocol**: Validated, byte-exact frame encoding
//! - **Battery Monitoring**: Push-based battery reports, cached per session
//! - **Transport Seam**: Session logic is independent of the radio stack
//!   and fully testable against a mock transport
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use otobuds_ble::{BleTransport, Command, DeviceSession, Result, SessionEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let session = DeviceSession::new(BleTransport::new().await?);
//!     let mut events = session.subscribe_events();
//!
//!     session.start_scan().await?;
//!
//!     // Take the first accessory that shows up.
//!     let device = loop {
//!         if let Ok(SessionEvent::DeviceDiscovered(device)) = events.recv().await {
//!             break device;
//!         }
//!     };
//!
//!     session.select_device(&device).await?;
//!
//!     // Sweep 440 Hz -> 880 Hz over 100 ms at amplitude 1200, then play it.
//!     session
//!         .dispatch(&Command::chirp_config(440, 880, 100, 1200)?)
//!         .await?;
//!     session.dispatch(&Command::Play).await?;
//!
//!     println!("Battery: {:?}", session.battery_percent());
//!
//!     session.disconnect().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Platform Notes
//!
//! ### macOS
//! Requires Bluetooth permission. Add `NSBluetoothAlwaysUsageDescription`
//! to your Info.plist for bundled apps.
//!
//! ### Linux
//! Requires BlueZ. User may need to be in the `bluetooth` group.
//!
//! ### Windows
//! Requires Windows 10 or later with Bluetooth LE support.
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization/deserialization for data types

// Public modules
pub mod ble;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transport;

// Re-exports for convenience
pub use ble::BleTransport;
pub use error::{Error, RangeViolation, Result};
pub use session::{BatteryReading, DeviceSession, SessionEvent, SessionPhase};
pub use transport::{DeviceHandle, ResolvedUartService, ServiceBinding, Transport, UartProfile};

// Re-export commonly used types from submodules
pub use protocol::{ChirpParams, Command, FrameKind, MicParams, NotificationEvent, WireFrame};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_exports() {
        // Verify that key types are exported
        let _ = std::any::TypeId::of::<Error>();
        let _ = std::any::TypeId::of::<SessionPhase>();
        let _ = std::any::TypeId::of::<Command>();
        let _ = std::any::TypeId::of::<ChirpParams>();
        let _ = std::any::TypeId::of::<MicParams>();
        let _ = std::any::TypeId::of::<WireFrame>();
        let _ = std::any::TypeId::of::<DeviceHandle>();
        let _ = std::any::TypeId::of::<ServiceBinding>();
        let _ = std::any::TypeId::of::<BatteryReading>();
    }

    #[test]
    fn test_play_command_encoding() {
        let frame = Command::Play.to_frame().unwrap();
        assert_eq!(frame.to_bytes().as_ref(), &[0x43, 0x50, 0x00]);
    }
}
