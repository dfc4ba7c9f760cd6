//! URL template rendering
//!
//! HTTP-template payloads carry `${...}` placeholders resolved at call time:
//! `${value}` is the value being set (empty on a get), `${device.<field>}`
//! reads the device descriptor (`name`, `manufacturer`, `model`, `serial`).
//! Substituted text is percent-encoded so it is always safe in a query
//! string.

use crate::config::DeviceDescriptor;
use anyhow::{anyhow, Result};
use serde_json::Value;

/// Render `template` against a device and an invocation value. Unknown
/// placeholders are a configuration error.
pub fn render(template: &str, device: &DeviceDescriptor, value: &Value) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .ok_or_else(|| anyhow!("Unterminated placeholder in template: {}", template))?;
        let token = &after[..end];
        let substituted = lookup(token, device, value)?;
        out.push_str(&urlencoding::encode(&substituted));
        rest = &after[end + 1..];
    }
    out.push_str(rest);

    Ok(out)
}

fn lookup(token: &str, device: &DeviceDescriptor, value: &Value) -> Result<String> {
    match token {
        "value" => Ok(value_text(value)),
        "device.name" => Ok(device.name.clone()),
        "device.manufacturer" => Ok(device.manufacturer.clone().unwrap_or_default()),
        "device.model" => Ok(device.model.clone().unwrap_or_default()),
        "device.serial" => Ok(device.serial.clone().unwrap_or_default()),
        _ => Err(anyhow!("Unknown placeholder ${{{}}}", token)),
    }
}

/// Text form of a value for query-parameter use. Strings render bare (the
/// encoder handles escaping), null renders empty.
fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}
