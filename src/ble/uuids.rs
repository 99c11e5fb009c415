//! Default UART service and characteristic UUIDs.
//!
//! The Otobuds firmware follows the Nordic UART Service (NUS) convention.
//! Deployments with different identifiers override these through
//! [`UartProfile`](crate::transport::UartProfile).

use uuid::Uuid;

/// Nordic UART Service UUID.
pub const NUS_SERVICE_UUID: Uuid = Uuid::from_u128(0x6e40_0001_b5a3_f393_e0a9_e50e24dcca9e);
/// UART RX characteristic UUID (write to device).
pub const NUS_RX_UUID: Uuid = Uuid::from_u128(0x6e40_0002_b5a3_f393_e0a9_e50e24dcca9e);
/// UART TX characteristic UUID (notifications from device).
pub const NUS_TX_UUID: Uuid = Uuid::from_u128(0x6e40_0003_b5a3_f393_e0a9_e50e24dcca9e);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_format() {
        let service = NUS_SERVICE_UUID.to_string();
        assert!(service.contains("6e400001"));

        let rx = NUS_RX_UUID.to_string();
        assert!(rx.contains("6e400002"));

        let tx = NUS_TX_UUID.to_string();
        assert!(tx.contains("6e400003"));
    }

    #[test]
    fn test_uuids_are_distinct() {
        assert_ne!(NUS_SERVICE_UUID, NUS_RX_UUID);
        assert_ne!(NUS_RX_UUID, NUS_TX_UUID);
    }
}
