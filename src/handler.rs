//! Setting handler traits
//!
//! A handler services one direction of one device setting. Instead of
//! sniffing the runtime type of a handler's return value, dispatch works on
//! an explicit [`Outcome`]: either the handler already drove the watchdog
//! handle itself, or it hands back a future for the dispatcher to await.

use crate::device::Device;
use crate::watchdog::WatchdogHandle;
use anyhow::Result;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Option<Value>>> + Send + 'static>>;

/// What a handler did with the invocation.
pub enum Outcome {
    /// The handler delivered (or will deliver) its result through the
    /// watchdog handle on its own.
    Delivered,
    /// The handler produced a deferred value; the dispatcher awaits it and
    /// completes the handle, logging and swallowing any error.
    Pending(HandlerFuture),
}

/// Services `get(setting, cb)` for one setting.
pub trait GetHandler: Send + Sync {
    fn invoke(&self, device: &Device, handle: WatchdogHandle) -> Outcome;
}

/// Services `set(setting, value, cb)` for one setting.
pub trait SetHandler: Send + Sync {
    fn invoke(&self, device: &Device, value: Value, handle: WatchdogHandle) -> Outcome;
}

impl<F> GetHandler for F
where
    F: Fn(&Device, WatchdogHandle) -> Outcome + Send + Sync,
{
    fn invoke(&self, device: &Device, handle: WatchdogHandle) -> Outcome {
        self(device, handle)
    }
}

impl<F> SetHandler for F
where
    F: Fn(&Device, Value, WatchdogHandle) -> Outcome + Send + Sync,
{
    fn invoke(&self, device: &Device, value: Value, handle: WatchdogHandle) -> Outcome {
        self(device, value, handle)
    }
}

/// Lifecycle hook run once when a device accessor is constructed.
pub type HookFn = Arc<dyn Fn(&Device) + Send + Sync>;

/// Resolved handlers for one setting. A directive may fill one or both
/// directions (an HTTP template serves both, a module export only one).
#[derive(Clone, Default)]
pub struct SettingSlots {
    pub get: Option<Arc<dyn GetHandler>>,
    pub set: Option<Arc<dyn SetHandler>>,
}

impl SettingSlots {
    pub fn getter(handler: Arc<dyn GetHandler>) -> Self {
        Self {
            get: Some(handler),
            set: None,
        }
    }

    pub fn setter(handler: Arc<dyn SetHandler>) -> Self {
        Self {
            get: None,
            set: Some(handler),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.get.is_none() && self.set.is_none()
    }

    /// Fold another slot pair into this one; existing entries win.
    pub fn merge(&mut self, other: SettingSlots) {
        if self.get.is_none() {
            self.get = other.get;
        }
        if self.set.is_none() {
            self.set = other.set;
        }
    }
}
