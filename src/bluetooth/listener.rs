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

//! Observer contracts for status, device list and inbound data.

use tokio::sync::mpsc;

use super::platform::DeviceDescriptor;
use crate::state::AdapterStatus;

/// Notified on every status transition.
pub trait StateObserver: Send {
    fn on_state_changed(&mut self, status: AdapterStatus);
}

/// Notified with the full discovered list whenever it grows.
pub trait DeviceListObserver: Send {
    fn on_device_list_changed(&mut self, devices: &[DeviceDescriptor]);
}

/// Notified with every decoded chunk or frame.
pub trait DataObserver: Send {
    fn on_data_received(&mut self, data: &str);
}

impl<F: FnMut(AdapterStatus) + Send> StateObserver for F {
    fn on_state_changed(&mut self, status: AdapterStatus) {
        self(status)
    }
}

impl<F: FnMut(&[DeviceDescriptor]) + Send> DeviceListObserver for F {
    fn on_device_list_changed(&mut self, devices: &[DeviceDescriptor]) {
        self(devices)
    }
}

impl<F: FnMut(&str) + Send> DataObserver for F {
    fn on_data_received(&mut self, data: &str) {
        self(data)
    }
}

impl StateObserver for mpsc::UnboundedSender<AdapterStatus> {
    fn on_state_changed(&mut self, status: AdapterStatus) {
        let _ = self.send(status);
    }
}

impl DeviceListObserver for mpsc::UnboundedSender<Vec<DeviceDescriptor>> {
    fn on_device_list_changed(&mut self, devices: &[DeviceDescriptor]) {
        let _ = self.send(devices.to_vec());
    }
}

impl DataObserver for mpsc::UnboundedSender<String> {
    fn on_data_received(&mut self, data: &str) {
        let _ = self.send(data.to_string());
    }
}

/// The three optional observers held by the connection.
#[derive(Default)]
pub(crate) struct Listeners {
    state: Option<Box<dyn StateObserver>>,
    devices: Option<Box<dyn DeviceListObserver>>,
    data: Option<Box<dyn DataObserver>>,
}

impl Listeners {
    pub(crate) fn set_state(&mut self, observer: Box<dyn StateObserver>) {
        self.state = Some(observer);
    }

    pub(crate) fn set_devices(&mut self, observer: Box<dyn DeviceListObserver>) {
        self.devices = Some(observer);
    }

    pub(crate) fn set_data(&mut self, observer: Box<dyn DataObserver>) {
        self.data = Some(observer);
    }

    pub(crate) fn state_changed(&mut self, status: AdapterStatus) {
        if let Some(observer) = self.state.as_mut() {
            observer.on_state_changed(status);
        }
    }

    pub(crate) fn device_list_changed(&mut self, devices: &[DeviceDescriptor]) {
        if let Some(observer) = self.devices.as_mut() {
            observer.on_device_list_changed(devices);
        }
    }

    pub(crate) fn data_received(&mut self, data: &str) {
        if let Some(observer) = self.data.as_mut() {
            observer.on_data_received(data);
        }
    }
}
