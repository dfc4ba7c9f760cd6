//! Configuration expansion
//!
//! Single deterministic pass over the device list: every string leaf that
//! parses as a registered directive is replaced in place with the resolver's
//! output, everything else passes through unchanged. All devices expand
//! before any accessor is constructed, so there is no partial activation.
//! Directives are never re-resolved and schemes never see other unresolved
//! directives.

use super::schema::{
    setting_from_key, DeviceConfig, DeviceDescriptor, Direction, Entry, PlatformConfig,
};
use crate::handler::SettingSlots;
use crate::log::LogSink;
use crate::resolve::{Directive, Resolved, Resolver};
use anyhow::{anyhow, Result};
use serde_json::Value;
use std::time::Duration;

/// Expand every device in the platform configuration. Resolution errors
/// (unknown scheme, missing module export, malformed payload) fail the whole
/// expansion; a device with a merely-missing handler degrades at call time
/// instead.
pub fn expand(
    config: &PlatformConfig,
    resolver: &Resolver,
    sink: &LogSink,
) -> Result<Vec<DeviceDescriptor>> {
    config
        .devices
        .iter()
        .map(|device| expand_device(device, resolver, sink))
        .collect()
}

/// Expand a single device config into a descriptor.
pub fn expand_device(
    device: &DeviceConfig,
    resolver: &Resolver,
    sink: &LogSink,
) -> Result<DeviceDescriptor> {
    let mut descriptor = DeviceDescriptor::named(&device.name);
    descriptor.manufacturer = device.manufacturer.clone();
    descriptor.model = device.model.clone();
    descriptor.serial = device.serial.clone();
    descriptor.types = device.types.clone();
    if let Some(ms) = device.timeout_ms {
        descriptor.timeout = Duration::from_millis(ms);
    }

    for (key, entry) in &device.entries {
        match key.as_str() {
            "onCreate" => {
                descriptor.create_hook = resolve_hook(entry, resolver, sink, &device.name)?;
            }
            "module" => {
                descriptor.module = resolve_module(entry, resolver, sink, &device.name)?;
            }
            _ => match setting_from_key(key) {
                Some((direction, setting)) => {
                    let slots = resolve_slots(entry, direction, resolver, sink, key)?;
                    descriptor
                        .settings
                        .entry(setting)
                        .or_default()
                        .merge(slots);
                }
                None => {
                    expand_data_leaf(&mut descriptor, key, entry, resolver, sink)?;
                }
            },
        }
    }

    Ok(descriptor)
}

/// Resolve a handler-position entry (a `getX`/`setX` key) into slots for its
/// direction. Values that are not callable degrade gracefully: the slot
/// stays empty and the miss is reported at call time too.
fn resolve_slots(
    entry: &Entry,
    direction: Direction,
    resolver: &Resolver,
    sink: &LogSink,
    key: &str,
) -> Result<SettingSlots> {
    let resolved = match entry {
        Entry::Get(handler) => {
            return Ok(match direction {
                Direction::Get => SettingSlots::getter(handler.clone()),
                Direction::Set => {
                    sink.warn(&format!("{}: getter attached under a setter key", key));
                    SettingSlots::default()
                }
            });
        }
        Entry::Set(handler) => {
            return Ok(match direction {
                Direction::Set => SettingSlots::setter(handler.clone()),
                Direction::Get => {
                    sink.warn(&format!("{}: setter attached under a getter key", key));
                    SettingSlots::default()
                }
            });
        }
        Entry::Hook(_) => {
            sink.warn(&format!("{}: lifecycle hook is not a setting handler", key));
            return Ok(SettingSlots::default());
        }
        Entry::Data(_) => {
            sink.warn(&format!("{}: configuration value is not callable", key));
            return Ok(SettingSlots::default());
        }
        Entry::Text(text) => match Directive::parse(text) {
            Some(directive) => {
                if !resolver.is_registered(directive.scheme) {
                    return Err(anyhow!(
                        "{}: unknown directive scheme: {}",
                        key,
                        directive.scheme
                    ));
                }
                resolver.resolve(directive)?
            }
            None => {
                sink.warn(&format!("{}: configuration value is not callable", key));
                return Ok(SettingSlots::default());
            }
        },
    };

    match resolved {
        Resolved::Slots(slots) => Ok(match direction {
            // A dual-direction handler (HTTP template) placed under a getX
            // key serves only gets; the setX key is configured separately.
            Direction::Get => SettingSlots {
                get: slots.get,
                set: None,
            },
            Direction::Set => SettingSlots {
                get: None,
                set: slots.set,
            },
        }),
        Resolved::Module(_) | Resolved::Hook(_) | Resolved::Value(_) => {
            sink.warn(&format!("{}: directive did not resolve to a handler", key));
            Ok(SettingSlots::default())
        }
    }
}

fn resolve_hook(
    entry: &Entry,
    resolver: &Resolver,
    sink: &LogSink,
    device: &str,
) -> Result<Option<crate::handler::HookFn>> {
    match entry {
        Entry::Hook(hook) => Ok(Some(hook.clone())),
        Entry::Text(text) => match Directive::parse(text) {
            Some(directive) => match resolver.resolve(directive)? {
                Resolved::Hook(hook) => Ok(Some(hook)),
                _ => {
                    sink.warn(&format!("{}: onCreate did not resolve to a hook", device));
                    Ok(None)
                }
            },
            None => {
                sink.warn(&format!("{}: onCreate is not a hook", device));
                Ok(None)
            }
        },
        _ => {
            sink.warn(&format!("{}: onCreate is not a hook", device));
            Ok(None)
        }
    }
}

fn resolve_module(
    entry: &Entry,
    resolver: &Resolver,
    sink: &LogSink,
    device: &str,
) -> Result<Option<std::sync::Arc<crate::resolve::HandlerModule>>> {
    match entry {
        Entry::Text(text) => match Directive::parse(text) {
            Some(directive) => match resolver.resolve(directive)? {
                Resolved::Module(module) => Ok(Some(module)),
                _ => {
                    sink.warn(&format!("{}: module did not resolve to a module", device));
                    Ok(None)
                }
            },
            None => {
                sink.warn(&format!("{}: module is not a directive", device));
                Ok(None)
            }
        },
        _ => {
            sink.warn(&format!("{}: module is not a directive", device));
            Ok(None)
        }
    }
}

/// Data-position leaves: value-directives resolve in place, everything else
/// passes through unchanged.
fn expand_data_leaf(
    descriptor: &mut DeviceDescriptor,
    key: &str,
    entry: &Entry,
    resolver: &Resolver,
    sink: &LogSink,
) -> Result<()> {
    match entry {
        Entry::Text(text) => {
            if let Some(directive) = Directive::parse(text) {
                if resolver.is_registered(directive.scheme) {
                    match resolver.resolve(directive)? {
                        Resolved::Value(value) => {
                            descriptor.extra.insert(key.to_string(), value);
                        }
                        _ => {
                            sink.warn(&format!(
                                "{}: directive in data position did not resolve to a value",
                                key
                            ));
                            // Keep the configuration shape: the key stays
                            // present, holding its original text.
                            descriptor
                                .extra
                                .insert(key.to_string(), Value::String(text.clone()));
                        }
                    }
                    return Ok(());
                }
            }
            descriptor
                .extra
                .insert(key.to_string(), Value::String(text.clone()));
        }
        Entry::Data(value) => {
            descriptor.extra.insert(key.to_string(), value.clone());
        }
        Entry::Get(_) | Entry::Set(_) | Entry::Hook(_) => {
            sink.warn(&format!("{}: handler attached under a data key", key));
        }
    }
    Ok(())
}
