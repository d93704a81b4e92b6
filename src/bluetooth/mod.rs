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

//! Bluetooth serial link.
//!
//! Connection state machine, background connection attempt, stream pump and
//! the codec/framing helpers they share.

mod attempt;
#[cfg(feature = "bluez")]
pub mod bluez;
mod codec;
mod connection;
mod frame_buffer;
mod listener;
mod platform;
mod stream;

pub use attempt::{AttemptOutcome, ConnectionAttempt};
pub use codec::{Codec, CodecError, CodecMode};
pub use connection::BluetoothConnection;
pub use frame_buffer::FrameBuffer;
pub use listener::{DataObserver, DeviceListObserver, StateObserver};
pub use platform::{
    accept_profile_connection, AdapterHandle, ConnectTarget, DeviceDescriptor, DiscoveryService,
    DiscoverySink, Platform, RfcommSocket, SocketFactory, Transport, APP_SERVICE_UUID,
    FALLBACK_RFCOMM_CHANNEL,
};
pub use stream::{StreamConfig, StreamEnd};
