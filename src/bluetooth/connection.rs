// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Connection state machine.
//!
//! [`BluetoothConnection`] is the single owner and writer of the
//! [`AdapterStatus`]. It lives on one foreground task. Background work (the
//! connection attempt, the stream pump, discovery callbacks) never touches it
//! directly; it queues events which the foreground applies through
//! [`process_next`](BluetoothConnection::process_next) or
//! [`process_pending`](BluetoothConnection::process_pending).

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::attempt::{AttemptOutcome, ConnectionAttempt};
use super::listener::{DataObserver, DeviceListObserver, Listeners, StateObserver};
use super::platform::{AdapterHandle, DeviceDescriptor, DiscoverySink, Platform};
use super::stream::{StreamEnd, StreamPump, WriteError};
use crate::config::LinkConfig;
use crate::error::{LinkError, Result};
use crate::state::AdapterStatus;

/// Outcomes marshalled from background tasks to the foreground.
#[derive(Debug)]
pub(crate) enum LinkEvent {
    AttemptFinished {
        session: u64,
        outcome: AttemptOutcome,
    },
    DataReceived {
        session: u64,
        data: String,
    },
    StreamClosed {
        session: u64,
        end: StreamEnd,
    },
    DeviceFound {
        scan: u64,
        device: DeviceDescriptor,
    },
    DiscoveryFinished {
        scan: u64,
    },
}

/// Bluetooth serial link.
pub struct BluetoothConnection {
    platform: Option<Platform>,
    config: LinkConfig,
    status: AdapterStatus,
    scanned_devices: Vec<DeviceDescriptor>,
    selected_device: Option<DeviceDescriptor>,
    pump: Option<StreamPump>,
    listeners: Listeners,
    /// Bumped for every connection attempt.
    session: u64,
    /// Bumped for every scan.
    scan: u64,
    event_tx: mpsc::UnboundedSender<LinkEvent>,
    event_rx: mpsc::UnboundedReceiver<LinkEvent>,
}

impl BluetoothConnection {
    /// Create the link and determine the initial status.
    ///
    /// `None` means the host has no adapter. No observer is registered yet,
    /// so the initial status is not notified.
    pub async fn new(platform: Option<Platform>, config: LinkConfig) -> Self {
        let status = match &platform {
            None => AdapterStatus::Unsupported,
            Some(platform) => match platform.adapter.is_enabled().await {
                Ok(true) => AdapterStatus::Idle,
                Ok(false) => AdapterStatus::Off,
                Err(e) => {
                    warn!("Could not query adapter power, assuming off: {}", e);
                    AdapterStatus::Off
                }
            },
        };
        info!("Bluetooth link created: {}", status);

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            platform,
            config,
            status,
            scanned_devices: Vec::new(),
            selected_device: None,
            pump: None,
            listeners: Listeners::default(),
            session: 0,
            scan: 0,
            event_tx,
            event_rx,
        }
    }

    pub fn set_state_observer(&mut self, observer: impl StateObserver + 'static) {
        self.listeners.set_state(Box::new(observer));
    }

    pub fn set_device_list_observer(&mut self, observer: impl DeviceListObserver + 'static) {
        self.listeners.set_devices(Box::new(observer));
    }

    pub fn set_data_observer(&mut self, observer: impl DataObserver + 'static) {
        self.listeners.set_data(Box::new(observer));
    }

    /// Current status.
    pub fn status(&self) -> AdapterStatus {
        self.status
    }

    /// Device of the running attempt or session.
    pub fn selected_device(&self) -> Option<&DeviceDescriptor> {
        self.selected_device.as_ref()
    }

    /// Devices found by the current or last scan.
    pub fn discovered_devices(&self) -> &[DeviceDescriptor] {
        &self.scanned_devices
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Power the adapter on. Off -> Idle.
    pub async fn turn_on(&mut self) -> Result<()> {
        self.guard("turn_on", AdapterStatus::Off)?;
        let adapter = self.adapter()?;
        adapter.enable().await.map_err(|e| {
            error!("Failed to enable adapter: {}", e);
            LinkError::platform(e)
        })?;
        self.update_state(AdapterStatus::Idle);
        Ok(())
    }

    /// Power the adapter off. Idle -> Off.
    pub async fn turn_off(&mut self) -> Result<()> {
        self.guard("turn_off", AdapterStatus::Idle)?;
        let adapter = self.adapter()?;
        adapter.disable().await.map_err(|e| {
            error!("Failed to disable adapter: {}", e);
            LinkError::platform(e)
        })?;
        self.update_state(AdapterStatus::Off);
        Ok(())
    }

    /// Snapshot of bonded devices. Only available while Idle.
    pub async fn get_paired_devices(&self) -> Result<Vec<DeviceDescriptor>> {
        self.guard("get_paired_devices", AdapterStatus::Idle)?;
        let adapter = self.adapter()?;
        adapter.bonded_devices().await.map_err(|e| {
            error!("Failed to list bonded devices: {}", e);
            LinkError::platform(e)
        })
    }

    /// Start discovery. Idle -> Scanning.
    pub async fn start_scan(&mut self) -> Result<()> {
        self.guard("start_scan", AdapterStatus::Idle)?;
        let platform = self.require_platform()?.clone();

        self.scan += 1;
        let sink = DiscoverySink::new(self.scan, self.event_tx.clone());
        platform.discovery.start_discovery(sink).await.map_err(|e| {
            error!("Failed to start discovery: {}", e);
            LinkError::platform(e)
        })?;

        self.scanned_devices.clear();
        info!("Scan {} started", self.scan);
        self.update_state(AdapterStatus::Scanning);
        Ok(())
    }

    /// Stop discovery. Scanning -> Idle.
    pub async fn cancel_scan(&mut self) -> Result<()> {
        self.guard("cancel_scan", AdapterStatus::Scanning)?;
        let platform = self.require_platform()?.clone();

        if platform.discovery.is_discovering().await {
            if let Err(e) = platform.discovery.cancel_discovery().await {
                warn!("Failed to cancel discovery: {}", e);
            }
        }
        info!("Scan {} cancelled", self.scan);
        self.update_state(AdapterStatus::Idle);
        Ok(())
    }

    /// Start a background connection attempt. Idle -> Connecting.
    ///
    /// Exactly one of `Connected` or `Idle` follows once the attempt's
    /// outcome is processed.
    pub async fn connect(&mut self, device: DeviceDescriptor) -> Result<()> {
        self.guard("connect", AdapterStatus::Idle)?;
        let platform = self.require_platform()?.clone();

        self.session += 1;
        let session = self.session;
        info!("Connecting to {} (session {})", device, session);

        self.selected_device = Some(device.clone());
        self.update_state(AdapterStatus::Connecting);

        let attempt = ConnectionAttempt::new(
            device,
            self.config.connect_targets(),
            platform.sockets,
            platform.discovery,
        )
        .with_timeout(self.config.connect_timeout());

        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            let outcome = attempt.run().await;
            let _ = event_tx.send(LinkEvent::AttemptFinished { session, outcome });
        });

        Ok(())
    }

    /// Encode and queue `payload` for the remote device.
    ///
    /// Transport failures are not returned; they end the session and show up
    /// as a transition to Idle.
    pub fn send_data(&mut self, payload: &str) -> Result<()> {
        if self.status != AdapterStatus::Connected {
            return Err(self.reject("send_data"));
        }
        let Some(pump) = self.pump.as_ref() else {
            return Err(self.reject("send_data"));
        };

        let result = if pump.is_finished() {
            Err(WriteError::Closed)
        } else {
            pump.write(payload)
        };

        match result {
            Ok(()) => {
                debug!("Queued {} chars", payload.len());
                Ok(())
            }
            Err(WriteError::Codec(e)) => {
                warn!("Cannot encode payload: {}", e);
                Err(e.into())
            }
            Err(WriteError::Closed) => {
                warn!("Write on closed session {}", self.session);
                self.end_session();
                Ok(())
            }
        }
    }

    /// Close the session on request. Connected -> Idle.
    pub fn disconnect(&mut self) -> Result<()> {
        self.guard("disconnect", AdapterStatus::Connected)?;
        info!("Disconnecting session {}", self.session);
        self.end_session();
        Ok(())
    }

    /// Wait for the next background event and apply it.
    pub async fn process_next(&mut self) {
        if let Some(event) = self.event_rx.recv().await {
            self.handle_event(event);
        }
    }

    /// Apply every queued background event without waiting.
    pub fn process_pending(&mut self) -> usize {
        let mut count = 0;
        while let Ok(event) = self.event_rx.try_recv() {
            self.handle_event(event);
            count += 1;
        }
        count
    }

    fn handle_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::AttemptFinished { session, outcome } => {
                if session != self.session || self.status != AdapterStatus::Connecting {
                    debug!("Dropping stale attempt outcome for session {}", session);
                    return;
                }
                match outcome {
                    AttemptOutcome::Connected { transport, target } => {
                        info!("Session {} established via {}", session, target);
                        self.pump = Some(StreamPump::spawn(
                            session,
                            transport,
                            self.config.stream_config(),
                            self.event_tx.clone(),
                        ));
                        self.update_state(AdapterStatus::Connected);
                    }
                    AttemptOutcome::Failed => {
                        self.selected_device = None;
                        self.update_state(AdapterStatus::Idle);
                    }
                }
            }
            LinkEvent::DataReceived { session, data } => {
                if session == self.session && self.status == AdapterStatus::Connected {
                    self.listeners.data_received(&data);
                }
            }
            LinkEvent::StreamClosed { session, end } => {
                if session != self.session || self.pump.is_none() {
                    debug!("Session {} already released", session);
                    return;
                }
                info!("Session {} ended: {:?}", session, end);
                self.pump = None;
                self.selected_device = None;
                if self.status == AdapterStatus::Connected {
                    self.update_state(AdapterStatus::Idle);
                }
            }
            LinkEvent::DeviceFound { scan, device } => {
                if scan != self.scan || self.status != AdapterStatus::Scanning {
                    return;
                }
                self.scanned_devices.push(device);
                self.listeners.device_list_changed(&self.scanned_devices);
            }
            LinkEvent::DiscoveryFinished { scan } => {
                if scan == self.scan && self.status == AdapterStatus::Scanning {
                    info!("Scan {} finished", scan);
                    self.update_state(AdapterStatus::Idle);
                }
            }
        }
    }

    fn end_session(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.stop();
        }
        self.selected_device = None;
        self.update_state(AdapterStatus::Idle);
    }

    fn update_state(&mut self, status: AdapterStatus) {
        debug_assert_eq!(self.selected_device.is_some(), status.has_selected_device());
        debug!("Status {} -> {}", self.status, status);
        self.status = status;
        self.listeners.state_changed(status);
    }

    fn guard(&self, operation: &'static str, required: AdapterStatus) -> Result<()> {
        if self.status == required {
            Ok(())
        } else {
            Err(self.reject(operation))
        }
    }

    fn reject(&self, operation: &'static str) -> LinkError {
        warn!("Ignoring {} while {}", operation, self.status);
        LinkError::invalid_state(operation, self.status)
    }

    fn require_platform(&self) -> Result<&Platform> {
        self.platform.as_ref().ok_or(LinkError::Unsupported)
    }

    fn adapter(&self) -> Result<Arc<dyn AdapterHandle>> {
        Ok(self.require_platform()?.adapter.clone())
    }
}
