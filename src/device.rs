//! Device accessor
//!
//! The per-device runtime object. `get` and `set` locate the handler for a
//! setting in the expanded descriptor and invoke it through the watchdog, so
//! the caller's callback fires exactly once whatever the handler does.
//! Missing handlers and handler failures degrade to a logged diagnostic plus
//! a graceful completion with no value; the host framework never sees an
//! uncaught failure from a single operation.

use crate::bridge::{self, Service};
use crate::config::{getter_key, setter_key, DeviceDescriptor};
use crate::handler::Outcome;
use crate::log::LogSink;
use crate::platform::Platform;
use crate::watchdog::{self, Completion, InFlightGauge, WatchdogHandle};
use serde_json::Value;
use std::sync::{Arc, Weak};

pub struct Device {
    sink: LogSink,
    descriptor: DeviceDescriptor,
    gauge: Arc<InFlightGauge>,
    platform: Weak<Platform>,
}

impl Device {
    /// Construct the accessor and run its lifecycle hook, synchronously,
    /// before any get/set is possible.
    pub fn new(
        sink: LogSink,
        descriptor: DeviceDescriptor,
        platform: Weak<Platform>,
        gauge: Arc<InFlightGauge>,
    ) -> Arc<Self> {
        let device = Arc::new(Self {
            sink,
            descriptor,
            gauge,
            platform,
        });
        if let Some(hook) = device.descriptor.hook() {
            hook(&device);
        }
        device
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    pub fn sink(&self) -> &LogSink {
        &self.sink
    }

    /// The owning platform, if this accessor came from one and it is still
    /// alive.
    pub fn platform(&self) -> Option<Arc<Platform>> {
        self.platform.upgrade()
    }

    /// Read a setting. The completion fires exactly once: with the handler's
    /// value, with `Ok(None)` on a missing handler, swallowed failure, or
    /// timeout, or with `Err` on a transport failure.
    pub fn get(&self, setting: &str, completion: Completion) {
        let member = getter_key(setting);
        let handle = watchdog::guard(
            &member,
            self.descriptor.timeout,
            self.sink.clone(),
            self.gauge.clone(),
            completion,
        );

        match self.descriptor.get_handler(setting) {
            Some(handler) => {
                let outcome = handler.invoke(self, handle.clone());
                self.settle(member, outcome, handle);
            }
            None => {
                self.sink
                    .warn(&format!("Failed to {}: no handler configured", member));
                handle.complete(Ok(None));
            }
        }
    }

    /// Write a setting. Same dispatch shape as [`Device::get`] with the
    /// setter convention key.
    pub fn set(&self, setting: &str, value: Value, completion: Completion) {
        let member = setter_key(setting);
        let handle = watchdog::guard(
            &member,
            self.descriptor.timeout,
            self.sink.clone(),
            self.gauge.clone(),
            completion,
        );

        match self.descriptor.set_handler(setting) {
            Some(handler) => {
                let outcome = handler.invoke(self, value, handle.clone());
                self.settle(member, outcome, handle);
            }
            None => {
                self.sink
                    .warn(&format!("Failed to {}: no handler configured", member));
                handle.complete(Ok(None));
            }
        }
    }

    /// Chain a deferred handler result into the watchdog handle. A failed
    /// future is logged and swallowed; the caller still gets a completion.
    fn settle(&self, member: String, outcome: Outcome, handle: WatchdogHandle) {
        if let Outcome::Pending(future) = outcome {
            let sink = self.sink.clone();
            tokio::spawn(async move {
                match future.await {
                    Ok(value) => handle.complete(Ok(value)),
                    Err(e) => {
                        sink.warn(&format!("Failed to {}: {:#}", member, e));
                        handle.complete(Ok(None));
                    }
                }
            });
        }
    }

    /// The services this accessory exposes to the host framework.
    pub fn services(self: &Arc<Self>) -> Vec<Service> {
        bridge::accessory_services(self)
    }
}
