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

//! BlueZ backed platform for Linux hosts.

use anyhow::Result;
use async_trait::async_trait;
use bluer::rfcomm::{Profile, ProfileHandle, Role, SocketAddr, Stream};
use bluer::{Adapter, AdapterEvent, Address, Session};
use futures::StreamExt;
use parking_lot::Mutex;
use pin_project_lite::pin_project;
use std::collections::HashSet;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::platform::{
    accept_profile_connection, AdapterHandle, ConnectTarget, DeviceDescriptor, DiscoveryService,
    DiscoverySink, Platform, RfcommSocket, SocketFactory, Transport,
};
use crate::config::LinkConfig;

/// How long BlueZ may take to hand over the stream of a connected profile.
const PROFILE_STREAM_WAIT: Duration = Duration::from_secs(10);

fn to_io(err: impl std::error::Error + Send + Sync + 'static) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err)
}

async fn describe(adapter: &Adapter, addr: Address) -> DeviceDescriptor {
    let name = match adapter.device(addr) {
        Ok(device) => device.alias().await.unwrap_or_else(|_| addr.to_string()),
        Err(_) => addr.to_string(),
    };
    DeviceDescriptor::new(addr.to_string(), name)
}

/// Adjust link settings for BlueZ sockets.
///
/// RFCOMM sockets report a peer hang-up as a zero-length read, so it has to
/// end the session.
pub fn link_config(config: LinkConfig) -> LinkConfig {
    LinkConfig {
        eof_disconnects: true,
        ..config
    }
}

/// Open the default adapter.
///
/// Returns `Ok(None)` when BlueZ is reachable but no adapter exists.
pub async fn platform() -> Result<Option<Platform>> {
    let session = Session::new().await?;
    info!("BlueZ session created");

    let adapter = match session.default_adapter().await {
        Ok(adapter) => adapter,
        Err(e) => {
            warn!("No Bluetooth adapter: {}", e);
            return Ok(None);
        }
    };
    info!("Using Bluetooth adapter: {}", adapter.name());

    Ok(Some(Platform::new(
        Arc::new(BluezAdapter {
            adapter: adapter.clone(),
        }),
        Arc::new(BluezDiscovery {
            adapter: adapter.clone(),
            task: Mutex::new(None),
        }),
        Arc::new(BluezSockets { session, adapter }),
    )))
}

/// Power and bonding queries.
pub struct BluezAdapter {
    adapter: Adapter,
}

#[async_trait]
impl AdapterHandle for BluezAdapter {
    async fn is_enabled(&self) -> Result<bool> {
        Ok(self.adapter.is_powered().await?)
    }

    async fn enable(&self) -> Result<()> {
        info!("Powering on Bluetooth adapter...");
        Ok(self.adapter.set_powered(true).await?)
    }

    async fn disable(&self) -> Result<()> {
        info!("Powering off Bluetooth adapter...");
        Ok(self.adapter.set_powered(false).await?)
    }

    async fn bonded_devices(&self) -> Result<Vec<DeviceDescriptor>> {
        let mut devices = Vec::new();

        for addr in self.adapter.device_addresses().await? {
            let device = self.adapter.device(addr)?;
            if device.is_paired().await? {
                devices.push(describe(&self.adapter, addr).await);
            }
        }

        Ok(devices)
    }
}

/// Discovery session. Dropping the event stream stops discovery.
pub struct BluezDiscovery {
    adapter: Adapter,
    task: Mutex<Option<JoinHandle<()>>>,
}

#[async_trait]
impl DiscoveryService for BluezDiscovery {
    async fn start_discovery(&self, sink: DiscoverySink) -> Result<()> {
        let events = self.adapter.discover_devices().await?;
        let adapter = self.adapter.clone();

        let task = tokio::spawn(async move {
            let mut events = Box::pin(events);
            let mut seen = HashSet::new();

            while let Some(event) = events.next().await {
                if sink.is_closed() {
                    break;
                }
                if let AdapterEvent::DeviceAdded(addr) = event {
                    if seen.insert(addr) {
                        sink.device_found(describe(&adapter, addr).await);
                    }
                }
            }
            debug!("Discovery stream ended");
            sink.finished();
        });

        if let Some(previous) = self.task.lock().replace(task) {
            previous.abort();
        }
        Ok(())
    }

    async fn cancel_discovery(&self) -> Result<()> {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        Ok(())
    }

    async fn is_discovering(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }
}

/// RFCOMM socket creation.
pub struct BluezSockets {
    session: Session,
    adapter: Adapter,
}

#[async_trait]
impl SocketFactory for BluezSockets {
    async fn create_socket(
        &self,
        device: &DeviceDescriptor,
        target: ConnectTarget,
    ) -> io::Result<Box<dyn RfcommSocket>> {
        let address: Address = device.address.parse().map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid device address {}", device.address),
            )
        })?;

        let socket: Box<dyn RfcommSocket> = match target {
            ConnectTarget::ServiceRecord(uuid) => Box::new(ServiceSocket {
                session: self.session.clone(),
                adapter: self.adapter.clone(),
                address,
                uuid,
                profile: None,
                stream: None,
            }),
            ConnectTarget::Channel(channel) => Box::new(ChannelSocket {
                addr: SocketAddr::new(address, channel),
                stream: None,
            }),
        };
        Ok(socket)
    }
}

/// Client profile connection resolved through the remote service record.
struct ServiceSocket {
    session: Session,
    adapter: Adapter,
    address: Address,
    uuid: Uuid,
    profile: Option<ProfileHandle>,
    stream: Option<Stream>,
}

#[async_trait]
impl RfcommSocket for ServiceSocket {
    async fn connect(&mut self) -> io::Result<()> {
        let uuid = self.uuid;
        let profile = Profile {
            uuid,
            role: Some(Role::Client),
            require_authentication: Some(false),
            require_authorization: Some(false),
            auto_connect: Some(false),
            ..Default::default()
        };
        let mut handle = self.session.register_profile(profile).await.map_err(to_io)?;
        let device = self.adapter.device(self.address).map_err(to_io)?;

        let stream = accept_profile_connection(
            async { device.connect_profile(&uuid).await.map_err(to_io) },
            handle.next(),
            |request| request.accept().map_err(to_io),
            PROFILE_STREAM_WAIT,
        )
        .await?;

        self.profile = Some(handle);
        self.stream = Some(stream);
        Ok(())
    }

    async fn close(&mut self) -> io::Result<()> {
        self.profile = None;
        match self.stream.take() {
            Some(mut stream) => stream.shutdown().await,
            None => Ok(()),
        }
    }

    fn into_transport(self: Box<Self>) -> io::Result<Box<dyn Transport>> {
        let this = *self;
        let stream = this
            .stream
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))?;
        Ok(Box::new(ProfileStream {
            stream,
            _profile: this.profile,
        }))
    }
}

pin_project! {
    /// Stream of a profile connection. BlueZ unregisters the profile, and
    /// drops its connections, once the handle is gone.
    struct ProfileStream {
        #[pin]
        stream: Stream,
        _profile: Option<ProfileHandle>,
    }
}

impl AsyncRead for ProfileStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.project().stream.poll_read(cx, buf)
    }
}

impl AsyncWrite for ProfileStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.project().stream.poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().stream.poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().stream.poll_shutdown(cx)
    }
}

/// Direct connection to a fixed RFCOMM channel.
struct ChannelSocket {
    addr: SocketAddr,
    stream: Option<Stream>,
}

#[async_trait]
impl RfcommSocket for ChannelSocket {
    async fn connect(&mut self) -> io::Result<()> {
        let stream = Stream::connect(self.addr).await.map_err(to_io)?;
        self.stream = Some(stream);
        Ok(())
    }

    async fn close(&mut self) -> io::Result<()> {
        match self.stream.take() {
            Some(mut stream) => stream.shutdown().await,
            None => Ok(()),
        }
    }

    fn into_transport(self: Box<Self>) -> io::Result<Box<dyn Transport>> {
        let stream = self
            .stream
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))?;
        Ok(Box::new(stream))
    }
}
