//! btleplug-backed implementation of the transport port.
//!
//! Bridges the [`Transport`] trait onto a platform BLE adapter: scanning via
//! the central event stream, connection and service discovery on a single
//! peripheral, write-without-response for outbound frames, and a
//! notification pump feeding inbound bytes to the session.

use async_trait::async_trait;
use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::stream::StreamExt;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::transport::{DeviceHandle, ResolvedUartService, Transport, UartProfile};

/// Transport implementation over a platform Bluetooth adapter.
///
/// Holds at most one connected peripheral at a time.
pub struct BleTransport {
    /// The BLE adapter to use.
    adapter: Adapter,
    /// Whether scanning is currently active.
    is_scanning: Arc<RwLock<bool>>,
    /// The connected peripheral, if any.
    peripheral: Arc<RwLock<Option<Peripheral>>>,
    /// Handle to the scan event task.
    scan_handle: Arc<RwLock<Option<tokio::task::JoinHandle<()>>>>,
    /// Handle to the notification pump task.
    notify_handle: Arc<RwLock<Option<tokio::task::JoinHandle<()>>>>,
}

impl BleTransport {
    /// Create a transport on the first available Bluetooth adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if Bluetooth is not available.
    pub async fn new() -> Result<Self> {
        let manager = Manager::new()
            .await
            .map_err(|_e| Error::BluetoothUnavailable)?;

        let adapters = manager.adapters().await.map_err(Error::Bluetooth)?;

        let adapter = adapters
            .into_iter()
            .next()
            .ok_or(Error::BluetoothUnavailable)?;

        info!(
            "Using Bluetooth adapter: {:?}",
            adapter.adapter_info().await.ok()
        );

        Ok(Self::with_adapter(adapter))
    }

    /// Create a transport on a specific adapter.
    pub fn with_adapter(adapter: Adapter) -> Self {
        Self {
            adapter,
            is_scanning: Arc::new(RwLock::new(false)),
            peripheral: Arc::new(RwLock::new(None)),
            scan_handle: Arc::new(RwLock::new(None)),
            notify_handle: Arc::new(RwLock::new(None)),
        }
    }

    fn connected_peripheral(&self) -> Result<Peripheral> {
        self.peripheral.read().clone().ok_or(Error::ConnectionLost)
    }

    fn find_characteristic(
        peripheral: &Peripheral,
        uuid: Uuid,
    ) -> Result<btleplug::api::Characteristic> {
        peripheral
            .services()
            .iter()
            .flat_map(|service| service.characteristics.iter())
            .find(|characteristic| characteristic.uuid == uuid)
            .cloned()
            .ok_or_else(|| Error::CharacteristicNotFound {
                uuid: uuid.to_string(),
            })
    }

    /// Map write-path errors so the session can tell a dropped link from a
    /// recoverable failure.
    fn map_link_error(e: btleplug::Error) -> Error {
        match e {
            btleplug::Error::NotConnected => Error::ConnectionLost,
            other => Error::Bluetooth(other),
        }
    }

    /// Forward a discovered or updated peripheral to the session.
    async fn process_peripheral(
        adapter: &Adapter,
        id: PeripheralId,
        discovered: &mpsc::UnboundedSender<DeviceHandle>,
    ) {
        let peripheral = match adapter.peripheral(&id).await {
            Ok(p) => p,
            Err(e) => {
                trace!("Failed to get peripheral: {}", e);
                return;
            }
        };

        let properties = match peripheral.properties().await {
            Ok(Some(p)) => p,
            _ => return,
        };

        let handle = DeviceHandle {
            identifier: id.to_string(),
            name: properties.local_name,
            rssi: properties.rssi,
        };

        let _ = discovered.send(handle);
    }
}

#[async_trait]
impl Transport for BleTransport {
    async fn start_scan(&self, discovered: mpsc::UnboundedSender<DeviceHandle>) -> Result<()> {
        if *self.is_scanning.read() {
            debug!("Already scanning, ignoring start request");
            return Ok(());
        }

        info!("Starting BLE scan");

        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(Error::Bluetooth)?;

        *self.is_scanning.write() = true;

        let adapter = self.adapter.clone();
        let is_scanning = self.is_scanning.clone();

        let handle = tokio::spawn(async move {
            let mut events = match adapter.events().await {
                Ok(events) => events,
                Err(e) => {
                    error!("Failed to get adapter events: {}", e);
                    return;
                }
            };

            while *is_scanning.read() {
                tokio::select! {
                    Some(event) = events.next() => {
                        match event {
                            CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                                Self::process_peripheral(&adapter, id, &discovered).await;
                            }
                            _ => {}
                        }
                    }
                    _ = tokio::time::sleep(Duration::from_millis(100)) => {
                        if !*is_scanning.read() {
                            break;
                        }
                    }
                }
            }

            debug!("Scan event loop ended");
        });

        *self.scan_handle.write() = Some(handle);

        Ok(())
    }

    async fn stop_scan(&self) -> Result<()> {
        if !*self.is_scanning.read() {
            debug!("Not scanning, ignoring stop request");
            return Ok(());
        }

        info!("Stopping BLE scan");

        *self.is_scanning.write() = false;

        self.adapter.stop_scan().await.map_err(Error::Bluetooth)?;

        let handle = self.scan_handle.write().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        Ok(())
    }

    async fn connect(&self, device: DeviceHandle) -> Result<()> {
        let peripherals = self.adapter.peripherals().await.map_err(Error::Bluetooth)?;

        let peripheral = peripherals
            .into_iter()
            .find(|p| p.id().to_string() == device.identifier)
            .ok_or_else(|| Error::DeviceNotFound {
                identifier: device.identifier.clone(),
            })?;

        info!("Connecting to {}", device.display_name());

        peripheral
            .connect()
            .await
            .map_err(|e| Error::ConnectionFailed {
                reason: e.to_string(),
            })?;

        peripheral
            .discover_services()
            .await
            .map_err(Error::Bluetooth)?;

        *self.peripheral.write() = Some(peripheral);

        info!("Connected to {}", device.display_name());

        Ok(())
    }

    async fn resolve_uart_service(&self, profile: UartProfile) -> Result<ResolvedUartService> {
        let peripheral = self.connected_peripheral()?;

        let service = peripheral
            .services()
            .into_iter()
            .find(|s| s.uuid == profile.service)
            .ok_or_else(|| Error::ServiceNotFound {
                uuid: profile.service.to_string(),
            })?;

        let find = |uuid: Uuid| {
            service
                .characteristics
                .iter()
                .find(|c| c.uuid == uuid)
                .map(|c| c.uuid)
        };

        let resolved = ResolvedUartService {
            service: service.uuid,
            read_characteristic: find(profile.read_characteristic),
            write_characteristic: find(profile.write_characteristic),
        };

        debug!(
            "Resolved service {}: read={:?} write={:?}",
            resolved.service, resolved.read_characteristic, resolved.write_characteristic
        );

        Ok(resolved)
    }

    async fn write(&self, characteristic: Uuid, payload: Vec<u8>) -> Result<()> {
        let peripheral = self.connected_peripheral()?;
        let characteristic = Self::find_characteristic(&peripheral, characteristic)?;

        peripheral
            .write(&characteristic, &payload, WriteType::WithoutResponse)
            .await
            .map_err(Self::map_link_error)?;

        trace!(
            "Wrote {} bytes to characteristic {}",
            payload.len(),
            characteristic.uuid
        );

        Ok(())
    }

    async fn subscribe(
        &self,
        characteristic: Uuid,
        notifications: mpsc::UnboundedSender<Vec<u8>>,
    ) -> Result<()> {
        let peripheral = self.connected_peripheral()?;
        let target = Self::find_characteristic(&peripheral, characteristic)?;

        peripheral
            .subscribe(&target)
            .await
            .map_err(Error::Bluetooth)?;

        debug!("Subscribed to notifications from {}", characteristic);

        let mut stream = peripheral
            .notifications()
            .await
            .map_err(Error::Bluetooth)?;

        let handle = tokio::spawn(async move {
            while let Some(notification) = stream.next().await {
                if notification.uuid != characteristic {
                    continue;
                }

                trace!(
                    "Notification from {}: {:02X?}",
                    notification.uuid,
                    notification.value
                );

                if notifications.send(notification.value).is_err() {
                    break;
                }
            }

            debug!("Notification pump ended");
        });

        *self.notify_handle.write() = Some(handle);

        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        if let Some(handle) = self.notify_handle.write().take() {
            handle.abort();
        }

        let peripheral = self.peripheral.write().take();

        if let Some(peripheral) = peripheral {
            info!("Disconnecting");
            if let Err(e) = peripheral.disconnect().await {
                warn!("Disconnect reported: {}", e);
            }
        }

        Ok(())
    }
}

impl Drop for BleTransport {
    fn drop(&mut self) {
        *self.is_scanning.write() = false;
    }
}
