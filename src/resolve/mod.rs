//! Directive resolution
//!
//! Configuration leaves may be directive strings of the form
//! `scheme:payload`. A [`Resolver`] maps each registered scheme name to a
//! [`Scheme`] that turns the payload into a live value or handler. Directives
//! are resolved exactly once, at configuration-expansion time; resolution
//! errors fail expansion fast at startup.

mod func;
mod get_url;
pub mod path;
pub mod template;

pub use func::{Export, FuncScheme, HandlerModule, ModuleRegistry};
pub use get_url::GetUrlScheme;

use crate::handler::{HookFn, SettingSlots};
use anyhow::{anyhow, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A parsed `scheme:payload` pair. Parsing is scheme-first-colon-split; the
/// payload format is scheme-specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Directive<'a> {
    pub scheme: &'a str,
    pub payload: &'a str,
}

impl<'a> Directive<'a> {
    /// Parse a candidate directive. Strings without a colon, or whose scheme
    /// part is not a plain identifier, are ordinary data.
    pub fn parse(text: &'a str) -> Option<Self> {
        let (scheme, payload) = text.split_once(':')?;
        let mut chars = scheme.chars();
        let first = chars.next()?;
        if !first.is_ascii_alphabetic() {
            return None;
        }
        if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return None;
        }
        Some(Self { scheme, payload })
    }
}

/// Output of resolving one directive.
pub enum Resolved {
    /// One or both directions of a setting handler.
    Slots(SettingSlots),
    /// A whole handler module, used as a per-device fallback.
    Module(Arc<HandlerModule>),
    /// A lifecycle hook.
    Hook(HookFn),
    /// A plain value substituted in place.
    Value(Value),
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolved::Slots(slots) => f
                .debug_struct("Slots")
                .field("get", &slots.get.is_some())
                .field("set", &slots.set.is_some())
                .finish(),
            Resolved::Module(_) => f.write_str("Module(..)"),
            Resolved::Hook(_) => f.write_str("Hook(..)"),
            Resolved::Value(v) => f.debug_tuple("Value").field(v).finish(),
        }
    }
}

/// A named resolution strategy.
pub trait Scheme: Send + Sync {
    fn resolve(&self, payload: &str) -> Result<Resolved>;
}

/// Registry of schemes, consulted by the config expander.
#[derive(Default)]
pub struct Resolver {
    schemes: HashMap<String, Arc<dyn Scheme>>,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver carrying the built-in `func` and `getUrl` schemes.
    pub fn with_builtin_schemes(modules: Arc<ModuleRegistry>) -> Self {
        let mut resolver = Self::new();
        resolver.register("func", Arc::new(FuncScheme::new(modules)));
        resolver.register("getUrl", Arc::new(GetUrlScheme::new()));
        resolver
    }

    pub fn register(&mut self, name: &str, scheme: Arc<dyn Scheme>) {
        self.schemes.insert(name.to_string(), scheme);
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.schemes.contains_key(name)
    }

    pub fn resolve(&self, directive: Directive<'_>) -> Result<Resolved> {
        let scheme = self
            .schemes
            .get(directive.scheme)
            .ok_or_else(|| anyhow!("Unknown directive scheme: {}", directive.scheme))?;
        scheme.resolve(directive.payload)
    }
}
