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

//! One-shot background connection attempt.

use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::platform::{
    ConnectTarget, DeviceDescriptor, DiscoveryService, RfcommSocket, SocketFactory, Transport,
};

/// Terminal result of a [`ConnectionAttempt`].
pub enum AttemptOutcome {
    /// A strategy connected. The transport now belongs to the receiver.
    Connected {
        transport: Box<dyn Transport>,
        target: ConnectTarget,
    },
    /// Every strategy failed. Nothing is left open.
    Failed,
}

impl fmt::Debug for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptOutcome::Connected { target, .. } => {
                f.debug_struct("Connected").field("target", target).finish()
            }
            AttemptOutcome::Failed => f.write_str("Failed"),
        }
    }
}

/// Opens a socket to one device, trying each target in order.
pub struct ConnectionAttempt {
    device: DeviceDescriptor,
    targets: Vec<ConnectTarget>,
    sockets: Arc<dyn SocketFactory>,
    discovery: Arc<dyn DiscoveryService>,
    connect_timeout: Option<Duration>,
}

impl ConnectionAttempt {
    pub fn new(
        device: DeviceDescriptor,
        targets: Vec<ConnectTarget>,
        sockets: Arc<dyn SocketFactory>,
        discovery: Arc<dyn DiscoveryService>,
    ) -> Self {
        Self {
            device,
            targets,
            sockets,
            discovery,
            connect_timeout: None,
        }
    }

    /// Bound every connect call.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Run the attempt to completion.
    pub async fn run(self) -> AttemptOutcome {
        // Discovery slows down connection establishment.
        if self.discovery.is_discovering().await {
            debug!("Cancelling discovery before connecting");
            if let Err(e) = self.discovery.cancel_discovery().await {
                warn!("Failed to cancel discovery: {}", e);
            }
        }

        for target in &self.targets {
            match self.try_target(*target).await {
                Ok(transport) => {
                    info!("Connected to {} via {}", self.device, target);
                    return AttemptOutcome::Connected {
                        transport,
                        target: *target,
                    };
                }
                Err(e) => {
                    warn!("Connecting to {} via {} failed: {}", self.device, target, e);
                }
            }
        }

        info!("All connect strategies exhausted for {}", self.device);
        AttemptOutcome::Failed
    }

    async fn try_target(&self, target: ConnectTarget) -> io::Result<Box<dyn Transport>> {
        let mut socket = self.sockets.create_socket(&self.device, target).await?;

        let connected = match self.connect_timeout {
            Some(limit) => match tokio::time::timeout(limit, socket.connect()).await {
                Ok(result) => result,
                Err(_) => Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connect timed out after {:?}", limit),
                )),
            },
            None => socket.connect().await,
        };

        if let Err(e) = connected {
            close_quietly(socket.as_mut()).await;
            return Err(e);
        }

        socket.into_transport()
    }
}

/// Close a socket, swallowing errors.
pub(crate) async fn close_quietly(socket: &mut dyn RfcommSocket) {
    if let Err(e) = socket.close().await {
        debug!("Ignoring socket close error: {}", e);
    }
}
