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

//! Stream pump for an established session.
//!
//! One task owns the transport. It reads chunks, reassembles frames when a
//! delimiter is configured, and writes queued payloads. Any I/O error ends the
//! session and closes the transport.

use std::io;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::codec::{Codec, CodecError, CodecMode};
use super::connection::LinkEvent;
use super::frame_buffer::FrameBuffer;
use super::platform::Transport;

/// Stream pump settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// Scratch buffer size for each read.
    pub read_chunk_size: usize,
    pub codec: CodecMode,
    /// Reassemble inbound bytes into frames ending with this byte.
    pub delimiter: Option<u8>,
    /// Appended to every outbound payload.
    pub terminator: Option<u8>,
    /// Treat a zero-length read as the end of the session.
    pub eof_disconnects: bool,
    /// Pause after a zero-length read before reading again.
    pub idle_backoff: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            read_chunk_size: 1024,
            codec: CodecMode::Hex,
            delimiter: None,
            terminator: None,
            eof_disconnects: false,
            idle_backoff: Duration::from_millis(20),
        }
    }
}

/// Why a session ended.
#[derive(Debug)]
pub enum StreamEnd {
    /// Stopped by the owner.
    Stopped,
    ReadFailed(io::Error),
    WriteFailed(io::Error),
}

/// Failure to queue an outbound payload.
#[derive(Debug)]
pub(crate) enum WriteError {
    Codec(CodecError),
    /// The pump already ended.
    Closed,
}

/// Handle to a running stream pump.
pub(crate) struct StreamPump {
    codec: Codec,
    terminator: Option<u8>,
    outbound_tx: mpsc::UnboundedSender<Vec<u8>>,
    stop_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl StreamPump {
    /// Take ownership of `transport` and start pumping.
    pub(crate) fn spawn(
        session: u64,
        transport: Box<dyn Transport>,
        config: StreamConfig,
        event_tx: mpsc::UnboundedSender<LinkEvent>,
    ) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel();
        let codec = Codec::new(config.codec);
        let terminator = config.terminator;

        let task = tokio::spawn(async move {
            let end = run(transport, &config, outbound_rx, stop_rx, |data| {
                let _ = event_tx.send(LinkEvent::DataReceived { session, data });
            })
            .await;

            match &end {
                StreamEnd::Stopped => info!("Session {} stopped", session),
                StreamEnd::ReadFailed(e) => warn!("Session {} read error: {}", session, e),
                StreamEnd::WriteFailed(e) => warn!("Session {} write error: {}", session, e),
            }
            let _ = event_tx.send(LinkEvent::StreamClosed { session, end });
        });

        Self {
            codec,
            terminator,
            outbound_tx,
            stop_tx: Some(stop_tx),
            task,
        }
    }

    /// Encode `payload` and queue it for the writer.
    pub(crate) fn write(&self, payload: &str) -> Result<(), WriteError> {
        let mut bytes = self.codec.encode(payload).map_err(WriteError::Codec)?;
        if let Some(terminator) = self.terminator {
            bytes.push(terminator);
        }
        self.outbound_tx.send(bytes).map_err(|_| WriteError::Closed)
    }

    /// Ask the pump to close the transport and exit.
    pub(crate) fn stop(mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Pump loop. Returns once the transport is closed.
async fn run(
    mut transport: Box<dyn Transport>,
    config: &StreamConfig,
    mut outbound_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    mut stop_rx: oneshot::Receiver<()>,
    mut deliver: impl FnMut(String),
) -> StreamEnd {
    let codec = Codec::new(config.codec);
    let mut frames = FrameBuffer::new();
    frames.set_delimiter(config.delimiter);
    let mut buf = vec![0u8; config.read_chunk_size.max(1)];

    let end = loop {
        tokio::select! {
            _ = &mut stop_rx => break StreamEnd::Stopped,
            Some(bytes) = outbound_rx.recv() => {
                debug!("Writing {} bytes", bytes.len());
                if let Err(e) = write_all(&mut transport, &bytes).await {
                    break StreamEnd::WriteFailed(e);
                }
            }
            result = transport.read(&mut buf) => match result {
                Ok(0) if config.eof_disconnects => {
                    break StreamEnd::ReadFailed(io::ErrorKind::UnexpectedEof.into());
                }
                Ok(0) => {
                    // Zero bytes is not end of stream here; keep listening.
                    tokio::time::sleep(config.idle_backoff).await;
                }
                Ok(n) => {
                    debug!("Read {} bytes", n);
                    if config.delimiter.is_some() {
                        frames.append(&buf[..n]);
                        while let Some(frame) = frames.next_frame() {
                            deliver(codec.decode(&frame));
                        }
                    } else {
                        deliver(codec.decode(&buf[..n]));
                    }
                }
                Err(e) => break StreamEnd::ReadFailed(e),
            },
        }
    };

    if let Err(e) = transport.shutdown().await {
        debug!("Ignoring transport close error: {}", e);
    }
    if !frames.is_empty() {
        warn!("Dropping {} unframed bytes", frames.len());
    }
    end
}

async fn write_all(transport: &mut Box<dyn Transport>, bytes: &[u8]) -> io::Result<()> {
    transport.write_all(bytes).await?;
    transport.flush().await
}
