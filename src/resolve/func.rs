//! Module-reference scheme
//!
//! `func:moduleName#exportName` resolves a named export from a module of
//! host-registered handlers; `func:moduleName` resolves the whole module,
//! whose exports then serve as per-device fallbacks for any setting the
//! configuration does not define explicitly. Resolution is synchronous and
//! happens once at expansion time.

use super::{Resolved, Scheme};
use crate::handler::{GetHandler, HookFn, SetHandler, SettingSlots};
use anyhow::{anyhow, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A single named export of a handler module.
#[derive(Clone)]
pub enum Export {
    Get(Arc<dyn GetHandler>),
    Set(Arc<dyn SetHandler>),
    Hook(HookFn),
    Value(Value),
}

/// A named collection of exports, registered by the host at bootstrap.
#[derive(Default)]
pub struct HandlerModule {
    exports: HashMap<String, Export>,
}

impl HandlerModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn export(mut self, name: &str, export: Export) -> Self {
        self.exports.insert(name.to_string(), export);
        self
    }

    pub fn getter(self, name: &str, handler: Arc<dyn GetHandler>) -> Self {
        self.export(name, Export::Get(handler))
    }

    pub fn setter(self, name: &str, handler: Arc<dyn SetHandler>) -> Self {
        self.export(name, Export::Set(handler))
    }

    pub fn hook(self, hook: HookFn) -> Self {
        self.export("onCreate", Export::Hook(hook))
    }

    pub fn export_named(&self, name: &str) -> Option<&Export> {
        self.exports.get(name)
    }

    pub fn on_create(&self) -> Option<HookFn> {
        match self.exports.get("onCreate") {
            Some(Export::Hook(hook)) => Some(hook.clone()),
            _ => None,
        }
    }
}

/// Registry of handler modules resolvable through the `func` scheme.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, Arc<HandlerModule>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, module: HandlerModule) {
        self.modules.insert(name.to_string(), Arc::new(module));
    }

    pub fn get(&self, name: &str) -> Option<Arc<HandlerModule>> {
        self.modules.get(name).cloned()
    }
}

pub struct FuncScheme {
    modules: Arc<ModuleRegistry>,
}

impl FuncScheme {
    pub fn new(modules: Arc<ModuleRegistry>) -> Self {
        Self { modules }
    }
}

impl Scheme for FuncScheme {
    fn resolve(&self, payload: &str) -> Result<Resolved> {
        let (module_name, export_name) = match payload.split_once('#') {
            Some((module, export)) => (module, Some(export)),
            None => (payload, None),
        };
        if module_name.is_empty() {
            return Err(anyhow!("func directive requires a module name"));
        }

        let module = self
            .modules
            .get(module_name)
            .ok_or_else(|| anyhow!("Unknown handler module: {}", module_name))?;

        match export_name {
            None => Ok(Resolved::Module(module)),
            Some(name) => match module.export_named(name) {
                Some(Export::Get(handler)) => Ok(Resolved::Slots(SettingSlots::getter(handler.clone()))),
                Some(Export::Set(handler)) => Ok(Resolved::Slots(SettingSlots::setter(handler.clone()))),
                Some(Export::Hook(hook)) => Ok(Resolved::Hook(hook.clone())),
                Some(Export::Value(value)) => Ok(Resolved::Value(value.clone())),
                None => Err(anyhow!("Module {} has no export {}", module_name, name)),
            },
        }
    }
}
