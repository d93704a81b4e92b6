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

//! Adapter and connection status.

use std::fmt;

/// Status of the local adapter and the serial link.
///
/// Exactly one value is live at a time and it is owned by
/// [`BluetoothConnection`](crate::bluetooth::BluetoothConnection).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterStatus {
    /// No adapter on this host.
    Unsupported,
    /// Adapter present but not yet classified. Never entered by the state machine.
    Supported,
    /// Adapter powered, nothing in progress.
    Idle,
    /// Adapter present but powered off.
    Off,
    /// Discovery running.
    Scanning,
    /// Connection attempt running in the background.
    Connecting,
    /// Stream session established.
    Connected,
}

impl AdapterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdapterStatus::Unsupported => "Unsupported",
            AdapterStatus::Supported => "Supported",
            AdapterStatus::Idle => "Idle",
            AdapterStatus::Off => "Off",
            AdapterStatus::Scanning => "Scanning...",
            AdapterStatus::Connecting => "Connecting...",
            AdapterStatus::Connected => "Connected",
        }
    }

    /// Whether a remote device may be selected in this status.
    pub fn has_selected_device(&self) -> bool {
        matches!(self, AdapterStatus::Connecting | AdapterStatus::Connected)
    }
}

impl fmt::Display for AdapterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
