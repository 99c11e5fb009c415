//! Inbound notification decoding.
//!
//! The accessory pushes small frames on the read characteristic. Only the
//! battery report is understood; everything else is surfaced as
//! [`NotificationEvent::Unrecognized`] and ignored by the session apart
//! from logging.

use crate::error::{Error, Result};

/// Identifying bytes for a battery report ("BL").
pub const BATTERY_REPORT_HEADER: [u8; 2] = [0x42, 0x4C];

/// Total length of a battery report frame: header plus one percent byte.
pub const BATTERY_REPORT_LEN: usize = 3;

/// A notification decoded from inbound bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    /// Battery percentage pushed by the device.
    ///
    /// The byte is passed through as reported. Firmware is expected to send
    /// 0-100, but values above 100 are not clamped here.
    BatteryReport(u8),
    /// A notification this codec does not understand. Expected traffic,
    /// never an error.
    Unrecognized(Vec<u8>),
}

/// Decode inbound bytes from the read characteristic.
///
/// A frame carrying the battery header with any length other than
/// [`BATTERY_REPORT_LEN`] is a length mismatch: the caller logs and drops
/// it rather than treating it as a battery report.
pub fn decode(data: &[u8]) -> Result<NotificationEvent> {
    if data.len() >= BATTERY_REPORT_HEADER.len() && data[..2] == BATTERY_REPORT_HEADER {
        if data.len() != BATTERY_REPORT_LEN {
            return Err(Error::DecodeMismatch {
                context: format!(
                    "battery report has {} bytes, header implies {}",
                    data.len(),
                    BATTERY_REPORT_LEN
                ),
            });
        }
        return Ok(NotificationEvent::BatteryReport(data[2]));
    }

    Ok(NotificationEvent::Unrecognized(data.to_vec()))
}
