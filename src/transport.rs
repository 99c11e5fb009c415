//! The transport port: the capability the session depends on to reach the
//! radio stack.
//!
//! [`crate::ble::BleTransport`] implements this trait for real hardware;
//! session unit tests substitute a generated mock. One transport instance
//! carries at most one connection, matching the single-session model.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::ble::uuids::{NUS_RX_UUID, NUS_SERVICE_UUID, NUS_TX_UUID};
use crate::error::Result;

/// A discovered peer: opaque identifier plus display data.
///
/// Produced by the transport during scanning; consumed, never mutated, by
/// the session.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceHandle {
    /// Platform-specific peripheral identifier.
    pub identifier: String,
    /// Advertised local name, if any.
    pub name: Option<String>,
    /// Signal strength in dBm at discovery time.
    pub rssi: Option<i16>,
}

impl DeviceHandle {
    /// Display name for UI listings.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("(unnamed)")
    }
}

/// The UART-like service and characteristic identifiers to resolve.
///
/// The accessory firmware exposes these as deployment configuration rather
/// than fixed constants. The default follows the Nordic UART Service layout.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UartProfile {
    /// The UART-like service UUID.
    pub service: Uuid,
    /// Notify characteristic (device to host).
    pub read_characteristic: Uuid,
    /// Write characteristic (host to device).
    pub write_characteristic: Uuid,
}

impl Default for UartProfile {
    fn default() -> Self {
        Self {
            service: NUS_SERVICE_UUID,
            read_characteristic: NUS_TX_UUID,
            write_characteristic: NUS_RX_UUID,
        }
    }
}

/// Raw result of service resolution.
///
/// Either characteristic may be absent; the session discards the whole
/// resolution and fails when one is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedUartService {
    /// The service that was found.
    pub service: Uuid,
    /// The notify characteristic, if present on the service.
    pub read_characteristic: Option<Uuid>,
    /// The write characteristic, if present on the service.
    pub write_characteristic: Option<Uuid>,
}

/// The fully-resolved communication triple for a live connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceBinding {
    /// The UART-like service UUID.
    pub service: Uuid,
    /// Notify characteristic (device to host).
    pub read_characteristic: Uuid,
    /// Write characteristic (host to device).
    pub write_characteristic: Uuid,
}

impl ServiceBinding {
    /// Build a binding from a raw resolution.
    ///
    /// Returns `None` when either characteristic is missing, which forces
    /// the session into its failed phase.
    pub fn from_resolved(resolved: &ResolvedUartService) -> Option<Self> {
        Some(Self {
            service: resolved.service,
            read_characteristic: resolved.read_characteristic?,
            write_characteristic: resolved.write_characteristic?,
        })
    }
}

/// Asynchronous operations the session needs from the radio stack.
///
/// Discovered peers and inbound notifications are delivered over channels
/// rather than callbacks, so consumers own a single receive loop instead of
/// scattered mutable callback state.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Begin scanning. Discovered peers are delivered on `discovered` until
    /// [`stop_scan`](Transport::stop_scan) is called.
    async fn start_scan(&self, discovered: mpsc::UnboundedSender<DeviceHandle>) -> Result<()>;

    /// Stop an active scan. Must complete before a connect is attempted.
    async fn stop_scan(&self) -> Result<()>;

    /// Connect to a previously discovered peer.
    async fn connect(&self, device: DeviceHandle) -> Result<()>;

    /// Resolve the UART-like service on the connected peer.
    async fn resolve_uart_service(&self, profile: UartProfile) -> Result<ResolvedUartService>;

    /// Write a frame to the given characteristic.
    async fn write(&self, characteristic: Uuid, payload: Vec<u8>) -> Result<()>;

    /// Subscribe to notifications on the given characteristic; inbound bytes
    /// are delivered on `notifications`.
    async fn subscribe(
        &self,
        characteristic: Uuid,
        notifications: mpsc::UnboundedSender<Vec<u8>>,
    ) -> Result<()>;

    /// Tear down the connection. Best-effort; the session treats the link as
    /// gone regardless of the outcome.
    async fn disconnect(&self) -> Result<()>;
}
