//! Platform controller and registry
//!
//! A platform owns the full device list for one configuration block. The
//! registry is an explicitly passed object (owned by the process bootstrap
//! layer, not a module-level static): it maps configuration-declared names to
//! running platform instances so external callers can look one up, and it
//! owns the in-flight watchdog gauge shared by every accessor.

use crate::config::{expand, DeviceConfig, PlatformConfig};
use crate::device::Device;
use crate::log::LogSink;
use crate::resolve::Resolver;
use crate::watchdog::InFlightGauge;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

// A panic while holding one of these locks leaves plain data behind, never a
// broken invariant, so poisoning is recovered rather than propagated.
fn recover<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Registry key used when a platform configuration declares no name.
pub const DEFAULT_PLATFORM_KEY: &str = "default";

#[derive(Default)]
pub struct PlatformRegistry {
    platforms: Mutex<HashMap<String, Arc<Platform>>>,
    gauge: Arc<InFlightGauge>,
}

impl PlatformRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Look up a running platform by its configured name.
    pub fn lookup(&self, name: &str) -> Option<Arc<Platform>> {
        recover(&self.platforms).get(name).cloned()
    }

    pub fn gauge(&self) -> Arc<InFlightGauge> {
        self.gauge.clone()
    }

    /// Watchdog guards currently in flight across every platform.
    pub fn in_flight(&self) -> usize {
        self.gauge.current()
    }

    fn insert(&self, name: &str, platform: Arc<Platform>) {
        recover(&self.platforms).insert(name.to_string(), platform);
    }
}

pub struct Platform {
    sink: LogSink,
    config: PlatformConfig,
    resolver: Resolver,
    gauge: Arc<InFlightGauge>,
    devices: Mutex<Vec<Arc<Device>>>,
}

impl Platform {
    /// Create a platform and register it under its configured name (or the
    /// default key).
    pub fn new(
        sink: LogSink,
        config: PlatformConfig,
        resolver: Resolver,
        registry: &PlatformRegistry,
    ) -> Arc<Self> {
        sink.info("Functor platform created");
        let platform = Arc::new(Self {
            gauge: registry.gauge(),
            sink,
            config,
            resolver,
            devices: Mutex::new(Vec::new()),
        });
        registry.insert(platform.name(), platform.clone());
        platform
    }

    pub fn name(&self) -> &str {
        self.config.name.as_deref().unwrap_or(DEFAULT_PLATFORM_KEY)
    }

    pub fn sink(&self) -> &LogSink {
        &self.sink
    }

    pub fn device_configs(&self) -> &[DeviceConfig] {
        &self.config.devices
    }

    /// Expand the configuration and hand one accessor per device to the
    /// callback. This is the sole entry point the host framework calls. All
    /// devices expand before any accessor is constructed; an expansion error
    /// is logged and yields an empty list rather than crossing the host
    /// boundary as a panic.
    pub fn accessories(self: &Arc<Self>, callback: impl FnOnce(Vec<Arc<Device>>)) {
        let descriptors = match expand(&self.config, &self.resolver, &self.sink) {
            Ok(descriptors) => descriptors,
            Err(e) => {
                self.sink
                    .warn(&format!("Failed to expand device configuration: {:#}", e));
                callback(Vec::new());
                return;
            }
        };

        let devices: Vec<Arc<Device>> = descriptors
            .into_iter()
            .map(|descriptor| {
                Device::new(
                    self.sink.clone(),
                    descriptor,
                    Arc::downgrade(self),
                    self.gauge.clone(),
                )
            })
            .collect();

        *recover(&self.devices) = devices.clone();
        callback(devices);
    }

    /// Accessors built by the last `accessories` call.
    pub fn devices(&self) -> Vec<Arc<Device>> {
        recover(&self.devices).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::ModuleRegistry;
    use serde_json::json;

    fn resolver() -> Resolver {
        Resolver::with_builtin_schemes(Arc::new(ModuleRegistry::new()))
    }

    fn config(value: serde_json::Value) -> PlatformConfig {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn registers_under_configured_name() {
        let registry = PlatformRegistry::new();
        let platform = Platform::new(
            LogSink::memory().0,
            config(json!({"name": "upstairs", "devices": []})),
            resolver(),
            &registry,
        );

        let found = registry.lookup("upstairs").expect("registered platform");
        assert!(Arc::ptr_eq(&found, &platform));
        assert!(registry.lookup("downstairs").is_none());
    }

    #[tokio::test]
    async fn unnamed_platform_registers_under_default_key() {
        let registry = PlatformRegistry::new();
        let platform = Platform::new(
            LogSink::memory().0,
            config(json!({"devices": []})),
            resolver(),
            &registry,
        );

        let found = registry.lookup(DEFAULT_PLATFORM_KEY).expect("default key");
        assert!(Arc::ptr_eq(&found, &platform));
    }

    #[tokio::test]
    async fn accessories_builds_one_device_per_entry() {
        let registry = PlatformRegistry::new();
        let platform = Platform::new(
            LogSink::memory().0,
            config(json!({"devices": [{"name": "Lamp"}, {"name": "Fan"}]})),
            resolver(),
            &registry,
        );

        let mut names = Vec::new();
        platform.accessories(|devices| {
            names = devices.iter().map(|d| d.name().to_string()).collect();
        });
        assert_eq!(names, ["Lamp", "Fan"]);

        // The platform keeps the list, and devices point back at it.
        let devices = platform.devices();
        assert_eq!(devices.len(), 2);
        let owner = devices[0].platform().expect("owning platform");
        assert!(Arc::ptr_eq(&owner, &platform));
    }

    #[tokio::test]
    async fn registry_recovers_from_a_poisoned_lock() {
        let registry = PlatformRegistry::new();
        let platform = Platform::new(
            LogSink::memory().0,
            config(json!({"name": "upstairs", "devices": []})),
            resolver(),
            &registry,
        );

        // Poison the registry lock from another thread.
        let poisoner = registry.clone();
        std::thread::spawn(move || {
            let _guard = poisoner.platforms.lock().unwrap();
            panic!("poison the registry lock");
        })
        .join()
        .unwrap_err();
        assert!(registry.platforms.is_poisoned());

        let found = registry.lookup("upstairs").expect("still registered");
        assert!(Arc::ptr_eq(&found, &platform));

        // New registrations still land.
        Platform::new(
            LogSink::memory().0,
            config(json!({"name": "downstairs", "devices": []})),
            resolver(),
            &registry,
        );
        assert!(registry.lookup("downstairs").is_some());
    }

    #[tokio::test]
    async fn expansion_error_yields_empty_list_and_a_log_line() {
        let (sink, lines) = LogSink::memory();
        let registry = PlatformRegistry::new();
        let platform = Platform::new(
            sink,
            config(json!({"devices": [{"name": "Lamp", "getPower": "mystery:x"}]})),
            resolver(),
            &registry,
        );

        let mut result = None;
        platform.accessories(|devices| result = Some(devices));
        assert_eq!(result.unwrap().len(), 0);
        assert!(lines
            .lock()
            .unwrap()
            .iter()
            .any(|l| l.contains("Failed to expand device configuration")));
    }
}
