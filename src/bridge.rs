//! Host framework boundary
//!
//! The accessory framework is a black box consumed through a narrow trait:
//! it registers a single-accessory adapter and a multi-accessory platform
//! adapter, and asks each accessory for its services. Services and
//! characteristics here are plain data with get/set closures delegating to
//! [`Device::get`]/[`Device::set`]; the characteristic model itself belongs
//! to the host.

use crate::config::{expand_device, DeviceConfig, PlatformConfig};
use crate::device::Device;
use crate::log::LogSink;
use crate::platform::{Platform, PlatformRegistry};
use crate::resolve::{ModuleRegistry, Resolver};
use crate::watchdog::Completion;
use anyhow::Result;
use serde_json::{json, Value};
use std::sync::{Arc, Weak};

pub const PLUGIN_NAME: &str = "functor-bridge";
pub const ACCESSORY_NAME: &str = "FunctorItem";
pub const PLATFORM_NAME: &str = "Functor";

pub type CharacteristicGet = Box<dyn Fn(Completion) + Send + Sync>;
pub type CharacteristicSet = Box<dyn Fn(Value, Completion) + Send + Sync>;

/// One gettable/settable attribute exposed to the host. Informational
/// characteristics carry a fixed `value` instead of closures.
pub struct Characteristic {
    pub name: &'static str,
    pub value: Option<Value>,
    pub on_get: Option<CharacteristicGet>,
    pub on_set: Option<CharacteristicSet>,
}

impl Characteristic {
    fn fixed(name: &'static str, value: Value) -> Self {
        Self {
            name,
            value: Some(value),
            on_get: None,
            on_set: None,
        }
    }

    fn wired(device: &Arc<Device>, name: &'static str, setting: &'static str) -> Self {
        let for_get = device.clone();
        let for_set = device.clone();
        Self {
            name,
            value: None,
            on_get: Some(Box::new(move |completion| for_get.get(setting, completion))),
            on_set: Some(Box::new(move |value, completion| {
                for_set.set(setting, value, completion)
            })),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Lightbulb,
    AccessoryInformation,
}

pub struct Service {
    pub kind: ServiceKind,
    pub name: String,
    pub characteristics: Vec<Characteristic>,
}

/// Build the service list for one accessory: a lightbulb wired to `power`
/// (plus `brightness` for dimmers) and the accessory information block.
pub fn accessory_services(device: &Arc<Device>) -> Vec<Service> {
    let mut characteristics = vec![Characteristic::wired(device, "On", "power")];
    if device.descriptor().is_dimmer() {
        characteristics.push(Characteristic::wired(device, "Brightness", "brightness"));
    }

    let descriptor = device.descriptor();
    let information = Service {
        kind: ServiceKind::AccessoryInformation,
        name: descriptor.name.clone(),
        characteristics: vec![
            Characteristic::fixed(
                "Manufacturer",
                json!(descriptor.manufacturer.clone().unwrap_or_else(|| "GENERIC".to_string())),
            ),
            Characteristic::fixed("Model", json!(descriptor.model.clone())),
            Characteristic::fixed("SerialNumber", json!(descriptor.serial.clone())),
        ],
    };

    vec![
        Service {
            kind: ServiceKind::Lightbulb,
            name: descriptor.name.clone(),
            characteristics,
        },
        information,
    ]
}

pub type AccessoryFactory = Box<dyn Fn(LogSink, DeviceConfig) -> Result<Arc<Device>> + Send + Sync>;
pub type PlatformFactory = Box<dyn Fn(LogSink, PlatformConfig) -> Arc<Platform> + Send + Sync>;

/// The two registration points the host framework exposes.
pub trait HostFramework {
    fn register_accessory(&mut self, plugin: &str, name: &str, factory: AccessoryFactory);
    fn register_platform(&mut self, plugin: &str, name: &str, factory: PlatformFactory);
}

/// Wire both adapters into the host. The registry and module registry are
/// owned by the process bootstrap layer and shared by everything the host
/// constructs through the factories.
pub fn register(
    host: &mut dyn HostFramework,
    registry: Arc<PlatformRegistry>,
    modules: Arc<ModuleRegistry>,
) {
    let platform_modules = modules.clone();
    let platform_registry = registry.clone();
    host.register_platform(
        PLUGIN_NAME,
        PLATFORM_NAME,
        Box::new(move |sink, config| {
            Platform::new(
                sink,
                config,
                Resolver::with_builtin_schemes(platform_modules.clone()),
                &platform_registry,
            )
        }),
    );

    host.register_accessory(
        PLUGIN_NAME,
        ACCESSORY_NAME,
        Box::new(move |sink, config| {
            let resolver = Resolver::with_builtin_schemes(modules.clone());
            let descriptor = expand_device(&config, &resolver, &sink)?;
            Ok(Device::new(sink, descriptor, Weak::new(), registry.gauge()))
        }),
    );
}
