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

//! Error types for the serial link.

use thiserror::Error;

use crate::bluetooth::CodecError;
use crate::state::AdapterStatus;

/// Result type alias using [`LinkError`].
pub type Result<T> = std::result::Result<T, LinkError>;

/// Errors surfaced by [`BluetoothConnection`](crate::bluetooth::BluetoothConnection).
///
/// Transport failures on an established session are not reported here; they
/// only show up as a status change back to `Idle`.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Operation called while its guard is false. Nothing was changed.
    #[error("{operation} not allowed while {status:?}")]
    InvalidState {
        operation: &'static str,
        status: AdapterStatus,
    },

    /// No adapter on this host.
    #[error("Bluetooth is not supported on this host")]
    Unsupported,

    /// A platform call (power, bonded list, discovery) failed.
    #[error("Platform error: {0}")]
    Platform(String),

    /// Payload could not be encoded for the wire.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

impl LinkError {
    pub(crate) fn invalid_state(operation: &'static str, status: AdapterStatus) -> Self {
        LinkError::InvalidState { operation, status }
    }

    pub(crate) fn platform(err: impl std::fmt::Display) -> Self {
        LinkError::Platform(err.to_string())
    }

    /// Whether this error is a rejected precondition.
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, LinkError::InvalidState { .. })
    }
}
