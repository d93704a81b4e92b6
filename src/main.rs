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

//! btserial terminal bridge.
//!
//! `btserial` lists bonded devices, `btserial scan` runs discovery for a few
//! seconds and `btserial connect <ADDRESS>` opens a session, forwarding stdin
//! lines to the device and printing what comes back.

use anyhow::{bail, Context, Result};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use btserial::bluetooth::{bluez, DeviceDescriptor};
use btserial::{AdapterStatus, BluetoothConnection, Config};

const SCAN_DURATION: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("btserial=info".parse()?),
        )
        .init();

    info!("Starting btserial v{}...", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    info!("Configuration loaded");

    let platform = bluez::platform().await?;
    let mut conn = BluetoothConnection::new(platform, bluez::link_config(config.link)).await;

    let (state_tx, mut state_rx) = mpsc::unbounded_channel::<AdapterStatus>();
    conn.set_state_observer(state_tx);
    conn.set_data_observer(|data: &str| println!("<-- {}", data));
    conn.set_device_list_observer(|devices: &[DeviceDescriptor]| {
        if let Some(device) = devices.last() {
            println!("found {}", device);
        }
    });

    match conn.status() {
        AdapterStatus::Unsupported => bail!("Bluetooth is not supported on this host"),
        AdapterStatus::Off => conn.turn_on().await?,
        _ => {}
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        None => {
            for device in conn.get_paired_devices().await? {
                println!("{}", device);
            }
        }
        Some("scan") => {
            conn.start_scan().await?;
            let deadline = tokio::time::sleep(SCAN_DURATION);
            tokio::pin!(deadline);
            while conn.status() == AdapterStatus::Scanning {
                tokio::select! {
                    _ = &mut deadline => break,
                    _ = conn.process_next() => {}
                }
            }
            if conn.status() == AdapterStatus::Scanning {
                conn.cancel_scan().await?;
            }
        }
        Some("connect") => {
            let address = args.get(1).context("usage: btserial connect <ADDRESS>")?;
            let device = conn
                .get_paired_devices()
                .await?
                .into_iter()
                .find(|d| d.address.eq_ignore_ascii_case(address))
                .unwrap_or_else(|| DeviceDescriptor::new(address.clone(), address.clone()));
            bridge(&mut conn, &mut state_rx, device).await?;
        }
        Some(other) => bail!("unknown command: {}", other),
    }

    info!("btserial stopped");
    Ok(())
}

/// Forward stdin to the device until the session ends.
async fn bridge(
    conn: &mut BluetoothConnection,
    state_rx: &mut mpsc::UnboundedReceiver<AdapterStatus>,
    device: DeviceDescriptor,
) -> Result<()> {
    conn.connect(device).await?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut was_connected = false;

    loop {
        tokio::select! {
            _ = conn.process_next() => {}
            Some(status) = state_rx.recv() => {
                info!("Status: {}", status);
                match status {
                    AdapterStatus::Connected => was_connected = true,
                    AdapterStatus::Idle if was_connected => {
                        info!("Session closed");
                        break;
                    }
                    AdapterStatus::Idle => bail!("Connection failed"),
                    _ => {}
                }
            }
            line = lines.next_line(), if was_connected => match line? {
                Some(line) => {
                    if let Err(e) = conn.send_data(line.trim()) {
                        error!("Not sent: {}", e);
                    }
                }
                None => {
                    conn.disconnect()?;
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                if conn.status() == AdapterStatus::Connected {
                    conn.disconnect()?;
                }
                break;
            }
        }
    }

    Ok(())
}
