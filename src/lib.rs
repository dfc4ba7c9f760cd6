//! functor-bridge
//!
//! An adapter layer that turns declarative device configuration into live,
//! callback-driven get/set operations for home-automation accessories.
//! String directives in the configuration (`func:module#export`,
//! `getUrl:urlTemplate#jsonPath`) are expanded once at startup into live
//! handlers; every get/set dispatch runs through a watchdog that guarantees
//! the caller's callback fires exactly once, with the real result or a
//! timeout fallback.

pub mod bridge;
pub mod config;
pub mod device;
pub mod handler;
pub mod log;
pub mod platform;
pub mod resolve;
pub mod watchdog;

pub use bridge::{register, HostFramework, Service};
pub use config::{expand, expand_device, DeviceConfig, DeviceDescriptor, Entry, PlatformConfig};
pub use device::Device;
pub use handler::{GetHandler, HandlerFuture, HookFn, Outcome, SetHandler, SettingSlots};
pub use log::LogSink;
pub use platform::{Platform, PlatformRegistry, DEFAULT_PLATFORM_KEY};
pub use resolve::{Export, HandlerModule, ModuleRegistry, Resolver, Scheme};
pub use watchdog::{Completion, InFlightGauge, WatchdogHandle};
