//! Device session state machine.
//!
//! Owns the lifecycle of a single accessory connection: phase transitions,
//! the discovered-device set, the resolved service binding, and the cached
//! battery reading. All radio access goes through the
//! [`Transport`](crate::transport::Transport) port, so the machine itself
//! never touches the platform BLE stack.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::protocol::notifications::{self, NotificationEvent};
use crate::protocol::Command;
use crate::transport::{DeviceHandle, ServiceBinding, Transport, UartProfile};

/// Connection phase of the session. Exactly one phase is active at a time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SessionPhase {
    /// No scan or connection in progress.
    #[default]
    Idle,
    /// Discovering nearby accessories.
    Scanning,
    /// Connecting to a selected accessory.
    Connecting,
    /// Resolving the UART-like service and its characteristics.
    ResolvingServices,
    /// Connected, subscribed, and accepting commands.
    Ready,
    /// Tearing the connection down.
    Disconnecting,
    /// Terminal until an explicit [`DeviceSession::disconnect`] resets the
    /// session to `Idle`. Carries a diagnostic reason.
    Failed(String),
}

impl SessionPhase {
    /// Check if commands can be dispatched.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Check if the session has failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Check if a connection attempt or teardown is in flight.
    pub fn is_transitioning(&self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::ResolvingServices | Self::Disconnecting
        )
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Scanning => write!(f, "Scanning"),
            Self::Connecting => write!(f, "Connecting"),
            Self::ResolvingServices => write!(f, "ResolvingServices"),
            Self::Ready => write!(f, "Ready"),
            Self::Disconnecting => write!(f, "Disconnecting"),
            Self::Failed(reason) => write!(f, "Failed({reason})"),
        }
    }
}

/// A battery level pushed by the accessory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BatteryReading {
    /// The percentage as reported by the firmware. Expected 0-100, but
    /// values above 100 are passed through unclamped.
    pub percent: u8,
    /// When the report arrived.
    pub received_at: DateTime<Utc>,
}

impl BatteryReading {
    fn now(percent: u8) -> Self {
        Self {
            percent,
            received_at: Utc::now(),
        }
    }

    /// Whether the reported value is inside the meaningful 0-100 range.
    pub fn is_plausible(&self) -> bool {
        self.percent <= 100
    }
}

/// Events surfaced to the UI collaborator.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The session moved to a new phase.
    PhaseChanged(SessionPhase),
    /// A new accessory appeared during scanning.
    DeviceDiscovered(DeviceHandle),
    /// The accessory pushed a battery report.
    BatteryUpdated(BatteryReading),
}

/// Decode inbound bytes and apply them to the battery cache.
///
/// Shared between the public entry point and the notification pump task;
/// touches only the battery field and the event channel, so it is safe to
/// run concurrently with any phase transition.
fn apply_notification(
    raw: &[u8],
    battery: &RwLock<Option<BatteryReading>>,
    event_tx: &broadcast::Sender<SessionEvent>,
) {
    match notifications::decode(raw) {
        Ok(NotificationEvent::BatteryReport(percent)) => {
            let reading = BatteryReading::now(percent);
            if !reading.is_plausible() {
                warn!("Battery report above 100%: {}", percent);
            }
            debug!("Battery level: {}%", percent);
            *battery.write() = Some(reading);
            let _ = event_tx.send(SessionEvent::BatteryUpdated(reading));
        }
        Ok(NotificationEvent::Unrecognized(bytes)) => {
            trace!("Ignoring unrecognized notification: {:02X?}", bytes);
        }
        Err(e) => {
            warn!("Dropping malformed notification: {}", e);
        }
    }
}

/// The session state machine for a single accessory connection.
///
/// At most one device handle and one service binding are live at a time;
/// starting a new scan while ready tears the previous binding down.
pub struct DeviceSession<T: Transport + 'static> {
    /// The transport port.
    transport: Arc<T>,
    /// Service and characteristic identifiers to resolve after connecting.
    profile: UartProfile,
    /// Current phase.
    phase: Arc<RwLock<SessionPhase>>,
    /// Devices discovered by the current scan, keyed by identifier.
    discovered: Arc<RwLock<HashMap<String, DeviceHandle>>>,
    /// The device the session is connected to, if any.
    device: Arc<RwLock<Option<DeviceHandle>>>,
    /// The resolved binding while ready.
    binding: Arc<RwLock<Option<ServiceBinding>>>,
    /// Last battery report, if any. Last-write-wins.
    battery: Arc<RwLock<Option<BatteryReading>>>,
    /// Channel for session events.
    event_tx: broadcast::Sender<SessionEvent>,
    /// Handle to the discovery pump task.
    scan_pump: RwLock<Option<tokio::task::JoinHandle<()>>>,
    /// Handle to the notification pump task.
    notify_pump: RwLock<Option<tokio::task::JoinHandle<()>>>,
}

impl<T: Transport + 'static> DeviceSession<T> {
    /// Create a session over the given transport with the default
    /// Nordic-UART profile.
    pub fn new(transport: T) -> Self {
        Self::with_profile(transport, UartProfile::default())
    }

    /// Create a session with a deployment-specific UART profile.
    pub fn with_profile(transport: T, profile: UartProfile) -> Self {
        let (event_tx, _) = broadcast::channel(64);

        Self {
            transport: Arc::new(transport),
            profile,
            phase: Arc::new(RwLock::new(SessionPhase::Idle)),
            discovered: Arc::new(RwLock::new(HashMap::new())),
            device: Arc::new(RwLock::new(None)),
            binding: Arc::new(RwLock::new(None)),
            battery: Arc::new(RwLock::new(None)),
            event_tx,
            scan_pump: RwLock::new(None),
            notify_pump: RwLock::new(None),
        }
    }

    // === Accessors ===

    /// Get the current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase.read().clone()
    }

    /// Get the devices discovered by the current scan.
    pub fn discovered_devices(&self) -> Vec<DeviceHandle> {
        self.discovered.read().values().cloned().collect()
    }

    /// Get the device the session is connected (or connecting) to.
    pub fn connected_device(&self) -> Option<DeviceHandle> {
        self.device.read().clone()
    }

    /// Get the resolved service binding, if the session is ready.
    pub fn service_binding(&self) -> Option<ServiceBinding> {
        self.binding.read().clone()
    }

    /// Get the last battery report.
    ///
    /// `None` means the accessory has never reported. Battery is push-only
    /// from the device; this never triggers a wire exchange.
    pub fn battery_reading(&self) -> Option<BatteryReading> {
        *self.battery.read()
    }

    /// Get the last reported battery percentage, if any.
    pub fn battery_percent(&self) -> Option<u8> {
        self.battery.read().map(|reading| reading.percent)
    }

    /// Subscribe to session events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    // === Phase management ===

    /// Guarded transition: moves to `next` only when `permitted` accepts the
    /// current phase, checked and swapped under one lock so an overlapping
    /// operation is rejected rather than queued. Returns the previous phase.
    fn begin(
        &self,
        operation: &'static str,
        permitted: impl FnOnce(&SessionPhase) -> bool,
        next: SessionPhase,
    ) -> Result<SessionPhase> {
        let previous = {
            let mut phase = self.phase.write();
            if !permitted(&phase) {
                return Err(Error::InvalidOperation {
                    operation,
                    phase: phase.clone(),
                });
            }
            std::mem::replace(&mut *phase, next.clone())
        };

        debug!("Session phase: {} -> {}", previous, next);
        let _ = self.event_tx.send(SessionEvent::PhaseChanged(next));

        Ok(previous)
    }

    fn set_phase(&self, next: SessionPhase) {
        let previous = {
            let mut phase = self.phase.write();
            std::mem::replace(&mut *phase, next.clone())
        };

        if previous != next {
            debug!("Session phase: {} -> {}", previous, next);
            let _ = self.event_tx.send(SessionEvent::PhaseChanged(next));
        }
    }

    fn fail(&self, reason: &str) {
        warn!("Session failed: {}", reason);
        self.set_phase(SessionPhase::Failed(reason.to_string()));
    }

    fn stop_scan_pump(&self) {
        if let Some(handle) = self.scan_pump.write().take() {
            handle.abort();
        }
    }

    fn stop_notify_pump(&self) {
        if let Some(handle) = self.notify_pump.write().take() {
            handle.abort();
        }
    }

    // === Operations ===

    /// Begin scanning for accessories.
    ///
    /// Valid from `Idle`, `Failed`, or `Ready`. From `Ready` the current
    /// binding is torn down first: the accessory supports one session at a
    /// time, so a new scan supersedes it.
    pub async fn start_scan(&self) -> Result<()> {
        let previous = self.begin(
            "start_scan",
            |phase| {
                matches!(
                    phase,
                    SessionPhase::Idle | SessionPhase::Failed(_) | SessionPhase::Ready
                )
            },
            SessionPhase::Scanning,
        )?;

        if previous == SessionPhase::Ready {
            info!("New scan requested while ready, tearing down current binding");
            self.stop_notify_pump();
            if let Err(e) = self.transport.disconnect().await {
                warn!("Disconnect before rescan reported: {}", e);
            }
            *self.binding.write() = None;
            *self.device.write() = None;
        }

        self.discovered.write().clear();

        let (discovered_tx, mut discovered_rx) = mpsc::unbounded_channel();

        if let Err(e) = self.transport.start_scan(discovered_tx).await {
            self.fail(&format!("scan failed: {e}"));
            return Err(e);
        }

        info!("Scanning for accessories");

        let discovered = self.discovered.clone();
        let event_tx = self.event_tx.clone();

        let handle = tokio::spawn(async move {
            while let Some(device) = discovered_rx.recv().await {
                let first_seen = {
                    let mut map = discovered.write();
                    let first_seen = !map.contains_key(&device.identifier);
                    map.insert(device.identifier.clone(), device.clone());
                    first_seen
                };

                if first_seen {
                    info!(
                        "Discovered {} ({})",
                        device.display_name(),
                        device.identifier
                    );
                    let _ = event_tx.send(SessionEvent::DeviceDiscovered(device));
                } else {
                    trace!("Updated {}", device.identifier);
                }
            }

            debug!("Discovery pump ended");
        });

        *self.scan_pump.write() = Some(handle);

        Ok(())
    }

    /// Connect to a discovered accessory and bring the link to `Ready`.
    ///
    /// Valid only from `Scanning`. Scanning is stopped before the connect
    /// attempt to avoid radio contention. A second call while a connect is
    /// in flight is rejected, not queued.
    pub async fn select_device(&self, device: &DeviceHandle) -> Result<()> {
        self.begin(
            "select_device",
            |phase| matches!(phase, SessionPhase::Scanning),
            SessionPhase::Connecting,
        )?;

        info!("Selected {}", device.display_name());

        if let Err(e) = self.transport.stop_scan().await {
            self.fail(&format!("stop scan failed: {e}"));
            return Err(e);
        }
        self.stop_scan_pump();

        if let Err(e) = self.transport.connect(device.clone()).await {
            self.fail(&format!("connect failed: {e}"));
            return Err(e);
        }

        *self.device.write() = Some(device.clone());
        self.set_phase(SessionPhase::ResolvingServices);

        let resolved = match self.transport.resolve_uart_service(self.profile.clone()).await {
            Ok(resolved) => resolved,
            Err(e) => {
                match &e {
                    Error::ServiceNotFound { .. } => self.fail("service not found"),
                    other => self.fail(&format!("service resolution failed: {other}")),
                }
                return Err(e);
            }
        };

        let binding = match ServiceBinding::from_resolved(&resolved) {
            Some(binding) => binding,
            None => {
                self.fail("characteristics not found");
                return Err(Error::CharacteristicsNotFound {
                    service: resolved.service.to_string(),
                });
            }
        };

        let (notify_tx, mut notify_rx) = mpsc::unbounded_channel();

        if let Err(e) = self
            .transport
            .subscribe(binding.read_characteristic, notify_tx)
            .await
        {
            self.fail(&format!("subscribe failed: {e}"));
            return Err(e);
        }

        let battery = self.battery.clone();
        let event_tx = self.event_tx.clone();

        let handle = tokio::spawn(async move {
            while let Some(raw) = notify_rx.recv().await {
                apply_notification(&raw, &battery, &event_tx);
            }

            debug!("Notification pump ended");
        });

        *self.notify_pump.write() = Some(handle);
        *self.binding.write() = Some(binding);

        self.set_phase(SessionPhase::Ready);
        info!("Session ready with {}", device.display_name());

        Ok(())
    }

    /// Encode a command and transmit it to the accessory.
    ///
    /// Valid only from `Ready`. A failed write is reported but leaves the
    /// session ready; a dropped link fails the session.
    /// [`Command::QueryBattery`] is answered from the cache and never
    /// crosses the wire.
    pub async fn dispatch(&self, command: &Command) -> Result<()> {
        let binding = {
            let phase = self.phase.read();
            if !phase.is_ready() {
                return Err(Error::InvalidOperation {
                    operation: "dispatch",
                    phase: phase.clone(),
                });
            }

            self.binding
                .read()
                .clone()
                .ok_or_else(|| Error::Internal("ready without a service binding".to_string()))?
        };

        let frame = match command.to_frame() {
            Some(frame) => frame,
            None => {
                debug!(
                    "Battery query answered from cache: {:?}",
                    self.battery_percent()
                );
                return Ok(());
            }
        };

        let bytes = frame.to_bytes();
        trace!("Dispatching {:?}: {:02X?}", frame.kind, &bytes[..]);

        match self
            .transport
            .write(binding.write_characteristic, bytes.to_vec())
            .await
        {
            Ok(()) => Ok(()),
            Err(Error::ConnectionLost) => {
                self.fail("connection lost");
                Err(Error::ConnectionLost)
            }
            Err(e) => {
                warn!("Write failed: {}", e);
                Err(e)
            }
        }
    }

    /// Feed inbound bytes from the read characteristic.
    ///
    /// Safe to invoke concurrently with any other operation: only the
    /// battery cache and the event channel are touched, and the battery
    /// update is last-write-wins.
    pub fn on_notification(&self, raw: &[u8]) {
        apply_notification(raw, &self.battery, &self.event_tx);
    }

    /// Tear down the session and return to `Idle`.
    ///
    /// No-op from `Idle`, so calling twice in a row is safe. This is also
    /// the only way out of `Failed`.
    pub async fn disconnect(&self) -> Result<()> {
        let previous = {
            let mut phase = self.phase.write();
            match &*phase {
                SessionPhase::Idle => {
                    debug!("Disconnect ignored: already idle");
                    return Ok(());
                }
                SessionPhase::Disconnecting => {
                    debug!("Disconnect already in progress");
                    return Ok(());
                }
                _ => std::mem::replace(&mut *phase, SessionPhase::Disconnecting),
            }
        };

        debug!("Session phase: {} -> Disconnecting", previous);
        let _ = self
            .event_tx
            .send(SessionEvent::PhaseChanged(SessionPhase::Disconnecting));

        if previous == SessionPhase::Scanning {
            if let Err(e) = self.transport.stop_scan().await {
                warn!("Stop scan during disconnect reported: {}", e);
            }
        }

        self.stop_scan_pump();
        self.stop_notify_pump();

        if let Err(e) = self.transport.disconnect().await {
            warn!("Transport disconnect reported: {}", e);
        }

        *self.binding.write() = None;
        *self.device.write() = None;
        self.discovered.write().clear();

        self.set_phase(SessionPhase::Idle);
        info!("Session idle");

        Ok(())
    }
}

impl<T: Transport + 'static> Drop for DeviceSession<T> {
    fn drop(&mut self) {
        self.stop_scan_pump();
        self.stop_notify_pump();
    }
}

impl<T: Transport + 'static> std::fmt::Debug for DeviceSession<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("phase", &self.phase())
            .field("battery", &self.battery_reading())
            .finish()
    }
}
