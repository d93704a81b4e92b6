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

//! Collaborator contracts: adapter, discovery and socket creation.
//!
//! The connection core never talks to a Bluetooth stack directly. Everything
//! platform specific sits behind these traits and is injected as a [`Platform`].

use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use super::connection::LinkEvent;

/// Service record this application registers on the peripheral.
pub const APP_SERVICE_UUID: Uuid = Uuid::from_u128(0xba287a8e_41df_44f8_b2b8_e7b4d9938deb);

/// RFCOMM channel used when the service record lookup fails.
pub const FALLBACK_RFCOMM_CHANNEL: u8 = 1;

/// A remote device as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceDescriptor {
    /// Hardware address, `AA:BB:CC:DD:EE:FF`.
    pub address: String,
    /// Human readable name or alias.
    pub name: String,
}

impl DeviceDescriptor {
    pub fn new(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}

/// An open bidirectional byte channel.
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Transport for T {}

/// How a socket reaches the remote serial service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectTarget {
    /// Look the channel up through the remote service record.
    ServiceRecord(Uuid),
    /// Connect straight to a fixed RFCOMM channel.
    Channel(u8),
}

impl fmt::Display for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectTarget::ServiceRecord(uuid) => write!(f, "service record {}", uuid),
            ConnectTarget::Channel(ch) => write!(f, "channel {}", ch),
        }
    }
}

/// A created but not yet connected socket.
#[async_trait]
pub trait RfcommSocket: Send {
    /// Block until the remote side accepts or the attempt fails.
    async fn connect(&mut self) -> io::Result<()>;

    /// Release the socket. Safe to call in any state.
    async fn close(&mut self) -> io::Result<()>;

    /// Hand the connected channel over to the stream pump.
    fn into_transport(self: Box<Self>) -> io::Result<Box<dyn Transport>>;
}

/// Drive a profile style connect where the stream arrives separately.
///
/// `connect` asks the stack to connect the profile and `incoming` yields the
/// connection the stack hands back. A `connect` failure ends the handshake at
/// once. After `connect` succeeds, `incoming` must deliver within `wait`.
/// The stack completes `connect` only after the request is answered, so the
/// request is accepted first.
pub async fn accept_profile_connection<R, T>(
    connect: impl Future<Output = io::Result<()>>,
    incoming: impl Future<Output = Option<R>>,
    accept: impl FnOnce(R) -> io::Result<T>,
    wait: Duration,
) -> io::Result<T> {
    tokio::pin!(connect);
    tokio::pin!(incoming);

    let mut connected = false;
    let request = loop {
        tokio::select! {
            result = &mut connect, if !connected => {
                result?;
                connected = true;
            }
            request = &mut incoming => break request,
            _ = tokio::time::sleep(wait), if connected => {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "profile connected but no stream was handed over",
                ));
            }
        }
    };

    let request = request.ok_or_else(|| {
        io::Error::new(io::ErrorKind::ConnectionRefused, "no connect request received")
    })?;
    let stream = accept(request)?;
    if !connected {
        connect.await?;
    }
    Ok(stream)
}

/// Creates sockets towards a remote device.
#[async_trait]
pub trait SocketFactory: Send + Sync {
    async fn create_socket(
        &self,
        device: &DeviceDescriptor,
        target: ConnectTarget,
    ) -> io::Result<Box<dyn RfcommSocket>>;
}

/// Local adapter capabilities.
#[async_trait]
pub trait AdapterHandle: Send + Sync {
    async fn is_enabled(&self) -> anyhow::Result<bool>;

    async fn enable(&self) -> anyhow::Result<()>;

    async fn disable(&self) -> anyhow::Result<()>;

    /// Devices bonded with this adapter.
    async fn bonded_devices(&self) -> anyhow::Result<Vec<DeviceDescriptor>>;
}

/// OS level device discovery.
#[async_trait]
pub trait DiscoveryService: Send + Sync {
    /// Start a scan. Found devices are reported through `sink`.
    async fn start_discovery(&self, sink: DiscoverySink) -> anyhow::Result<()>;

    async fn cancel_discovery(&self) -> anyhow::Result<()>;

    async fn is_discovering(&self) -> bool;
}

/// Everything the connection needs from the host platform.
#[derive(Clone)]
pub struct Platform {
    pub adapter: Arc<dyn AdapterHandle>,
    pub discovery: Arc<dyn DiscoveryService>,
    pub sockets: Arc<dyn SocketFactory>,
}

impl Platform {
    pub fn new(
        adapter: Arc<dyn AdapterHandle>,
        discovery: Arc<dyn DiscoveryService>,
        sockets: Arc<dyn SocketFactory>,
    ) -> Self {
        Self {
            adapter,
            discovery,
            sockets,
        }
    }
}

/// Inbound discovery events for one scan.
///
/// Events are queued to the foreground and dropped there once the scan that
/// created this sink is over.
#[derive(Clone)]
pub struct DiscoverySink {
    scan: u64,
    event_tx: mpsc::UnboundedSender<LinkEvent>,
}

impl DiscoverySink {
    pub(crate) fn new(scan: u64, event_tx: mpsc::UnboundedSender<LinkEvent>) -> Self {
        Self { scan, event_tx }
    }

    /// Report a found device.
    pub fn device_found(&self, device: DeviceDescriptor) {
        debug!("Discovery found {}", device);
        let _ = self.event_tx.send(LinkEvent::DeviceFound {
            scan: self.scan,
            device,
        });
    }

    /// Report that the platform ended the scan on its own.
    pub fn finished(&self) {
        let _ = self.event_tx.send(LinkEvent::DiscoveryFinished { scan: self.scan });
    }

    /// Whether the foreground is gone.
    pub fn is_closed(&self) -> bool {
        self.event_tx.is_closed()
    }
}
