//! Configuration schema types
//!
//! Per-setting handlers live in the device config under convention keys:
//! `get` or `set` followed by the capitalized setting name (`power` ->
//! `getPower`/`setPower`, case preserved after the first letter). The
//! expanded [`DeviceDescriptor`] turns those string keys into a structured
//! per-setting handler table.

use crate::handler::{GetHandler, HookFn, SetHandler, SettingSlots};
use crate::resolve::{Export, HandlerModule};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Top-level platform configuration: `{ name?, devices: [...] }`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlatformConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

/// Raw configuration for one device. Known metadata fields are typed; every
/// other entry is a free-form leaf (possibly a directive, possibly an
/// attached handler when built programmatically).
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    pub name: String,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub serial: Option<String>,
    #[serde(default)]
    pub types: Vec<String>,
    /// Per-device watchdog timeout in milliseconds.
    #[serde(default, rename = "timeout")]
    pub timeout_ms: Option<u64>,
    #[serde(flatten)]
    pub entries: BTreeMap<String, Entry>,
}

impl DeviceConfig {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            manufacturer: None,
            model: None,
            serial: None,
            types: Vec::new(),
            timeout_ms: None,
            entries: BTreeMap::new(),
        }
    }

    /// Attach a literal getter for `setting` under the convention key.
    pub fn getter(mut self, setting: &str, handler: Arc<dyn GetHandler>) -> Self {
        self.entries.insert(getter_key(setting), Entry::Get(handler));
        self
    }

    /// Attach a literal setter for `setting` under the convention key.
    pub fn setter(mut self, setting: &str, handler: Arc<dyn SetHandler>) -> Self {
        self.entries.insert(setter_key(setting), Entry::Set(handler));
        self
    }

    pub fn on_create(mut self, hook: HookFn) -> Self {
        self.entries.insert("onCreate".to_string(), Entry::Hook(hook));
        self
    }

    /// Attach a raw string entry (typically a directive).
    pub fn text(mut self, key: &str, text: &str) -> Self {
        self.entries
            .insert(key.to_string(), Entry::Text(text.to_string()));
        self
    }
}

/// One free-form configuration leaf.
#[derive(Clone)]
pub enum Entry {
    /// A string leaf; may be a `scheme:payload` directive.
    Text(String),
    /// Any other plain data leaf.
    Data(Value),
    /// A literal getter, attached programmatically.
    Get(Arc<dyn GetHandler>),
    /// A literal setter, attached programmatically.
    Set(Arc<dyn SetHandler>),
    /// A literal lifecycle hook, attached programmatically.
    Hook(HookFn),
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entry::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Entry::Data(v) => f.debug_tuple("Data").field(v).finish(),
            Entry::Get(_) => f.write_str("Get(..)"),
            Entry::Set(_) => f.write_str("Set(..)"),
            Entry::Hook(_) => f.write_str("Hook(..)"),
        }
    }
}

impl<'de> Deserialize<'de> for Entry {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::String(s) => Entry::Text(s),
            other => Entry::Data(other),
        })
    }
}

/// Handler key direction, recovered from a `getX`/`setX` config key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Get,
    Set,
}

fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// `power` -> `getPower`.
pub fn getter_key(setting: &str) -> String {
    format!("get{}", upper_first(setting))
}

/// `brightness` -> `setBrightness`.
pub fn setter_key(setting: &str) -> String {
    format!("set{}", upper_first(setting))
}

/// Recover `(direction, setting)` from a convention key. Only keys whose
/// remainder starts with an uppercase letter count; `getaway` is data.
pub fn setting_from_key(key: &str) -> Option<(Direction, String)> {
    let (direction, rest) = if let Some(rest) = key.strip_prefix("get") {
        (Direction::Get, rest)
    } else if let Some(rest) = key.strip_prefix("set") {
        (Direction::Set, rest)
    } else {
        return None;
    };
    if !rest.chars().next().is_some_and(|c| c.is_uppercase()) {
        return None;
    }
    Some((direction, lower_first(rest)))
}

/// Expanded, ready-to-use configuration for one controllable device.
#[derive(Clone)]
pub struct DeviceDescriptor {
    pub name: String,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub serial: Option<String>,
    pub types: Vec<String>,
    pub timeout: Duration,
    /// Plain data leaves that survived expansion unchanged (or were
    /// value-directives, resolved in place).
    pub extra: BTreeMap<String, Value>,
    pub(crate) settings: HashMap<String, SettingSlots>,
    pub(crate) module: Option<Arc<HandlerModule>>,
    pub(crate) create_hook: Option<HookFn>,
}

impl DeviceDescriptor {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            manufacturer: None,
            model: None,
            serial: None,
            types: Vec::new(),
            timeout: Self::DEFAULT_TIMEOUT,
            extra: BTreeMap::new(),
            settings: HashMap::new(),
            module: None,
            create_hook: None,
        }
    }

    /// Getter for a setting: the explicit slot first, then the fallback
    /// module's export under the convention key.
    pub fn get_handler(&self, setting: &str) -> Option<Arc<dyn GetHandler>> {
        if let Some(handler) = self.settings.get(setting).and_then(|s| s.get.clone()) {
            return Some(handler);
        }
        match self
            .module
            .as_ref()
            .and_then(|m| m.export_named(&getter_key(setting)))
        {
            Some(Export::Get(handler)) => Some(handler.clone()),
            _ => None,
        }
    }

    pub fn set_handler(&self, setting: &str) -> Option<Arc<dyn SetHandler>> {
        if let Some(handler) = self.settings.get(setting).and_then(|s| s.set.clone()) {
            return Some(handler);
        }
        match self
            .module
            .as_ref()
            .and_then(|m| m.export_named(&setter_key(setting)))
        {
            Some(Export::Set(handler)) => Some(handler.clone()),
            _ => None,
        }
    }

    /// Lifecycle hook: explicit `onCreate` entry first, then the module's.
    pub fn hook(&self) -> Option<HookFn> {
        self.create_hook
            .clone()
            .or_else(|| self.module.as_ref().and_then(|m| m.on_create()))
    }

    pub fn is_dimmer(&self) -> bool {
        self.types.iter().any(|t| t == "dimmer")
    }
}

impl fmt::Debug for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceDescriptor")
            .field("name", &self.name)
            .field("types", &self.types)
            .field("timeout", &self.timeout)
            .field("settings", &self.settings.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
