//! Configuration model and expansion
//!
//! Raw configuration is a serde-shaped tree whose string leaves may be
//! `scheme:payload` directives. Expansion walks the device list once,
//! replacing every directive with resolver output and producing ready-to-use
//! device descriptors.

mod expander;
mod schema;

pub use expander::{expand, expand_device};
pub use schema::{
    getter_key, setter_key, setting_from_key, DeviceConfig, DeviceDescriptor, Direction, Entry,
    PlatformConfig,
};
