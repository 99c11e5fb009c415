//! Error types for the otobuds-ble crate.

use thiserror::Error;

use crate::session::SessionPhase;

/// A numeric parameter that failed range validation.
///
/// Produced by the validated [`ChirpParams`](crate::protocol::ChirpParams)
/// and [`MicParams`](crate::protocol::MicParams) constructors before any
/// wire bytes exist. Names the offending field and the bounds it violated.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{field} = {value} outside allowed range [{min}, {max}]")]
pub struct RangeViolation {
    /// The name of the field that failed validation.
    pub field: &'static str,
    /// The value that was supplied.
    pub value: i16,
    /// The lowest accepted value.
    pub min: i16,
    /// The highest accepted value.
    pub max: i16,
}

/// The main error type for this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Bluetooth-related error from the underlying BLE library.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Bluetooth is not available or is disabled on this system.
    #[error("Bluetooth not available or disabled")]
    BluetoothUnavailable,

    /// The specified device was not found.
    #[error("Device not found: {identifier}")]
    DeviceNotFound {
        /// The identifier that was searched for.
        identifier: String,
    },

    /// An operation was invoked from a session phase that forbids it.
    ///
    /// Rejected synchronously with no side effect; the session phase is
    /// unchanged.
    #[error("operation '{operation}' not valid in phase {phase}")]
    InvalidOperation {
        /// The operation that was attempted.
        operation: &'static str,
        /// The phase the session was in at the time.
        phase: SessionPhase,
    },

    /// Failed to establish a connection to the device.
    #[error("Connection failed: {reason}")]
    ConnectionFailed {
        /// Description of why the connection failed.
        reason: String,
    },

    /// The connection to the device was lost.
    #[error("Connection lost")]
    ConnectionLost,

    /// The UART-like service was not present on the device.
    #[error("Service not found: {uuid}")]
    ServiceNotFound {
        /// The UUID of the service that was not found.
        uuid: String,
    },

    /// The UART-like service is present but a required characteristic is
    /// missing, so the resolution must be discarded.
    #[error("Characteristics not found on service {service}")]
    CharacteristicsNotFound {
        /// The UUID of the service whose characteristics were incomplete.
        service: String,
    },

    /// Characteristic not found on the device.
    #[error("Characteristic not found: {uuid}")]
    CharacteristicNotFound {
        /// The UUID of the characteristic that was not found.
        uuid: String,
    },

    /// An inbound frame's length does not match the length implied by its
    /// header bytes. Logged and dropped by the session, never fatal.
    #[error("Frame length mismatch: {context}")]
    DecodeMismatch {
        /// Description of the mismatch.
        context: String,
    },

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(#[from] RangeViolation),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
