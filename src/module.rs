//! Modules: named bundles of actions.
//!
//! Modules are registered while the app is being built
//! ([`AppBuilder::module`](crate::AppBuilder::module)) and frozen with it.
//! During serving the registry is only ever read, from any number of
//! request threads at once, so it needs no lock.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::context::Context;
use crate::error::{Error, HttpError};
use crate::handler::Actions;

/// A bundle of actions dispatched against a scoped copy of the context.
///
/// ```rust
/// use halyard::{Context, Error, Module};
/// use serde_json::{Value, json};
///
/// fn list(ctx: &mut Context<'_>) -> Result<Value, Error> {
///     ctx.ok(json!([1, 2, 3]))
/// }
///
/// let widgets = Module::new()
///     .action("list", list)
///     .action("count", |ctx| ctx.ok(3));
/// ```
#[derive(Clone, Debug, Default)]
pub struct Module {
    actions: Actions,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an action. Returns `self` for chaining.
    pub fn action<F>(mut self, name: &str, action: F) -> Self
    where
        F: Fn(&mut Context<'_>) -> Result<Value, Error> + Send + Sync + 'static,
    {
        self.actions.insert(name, action);
        self
    }

    pub fn actions(&self) -> &Actions {
        &self.actions
    }
}

/// Module name → bundle.
#[derive(Clone, Debug, Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, Module>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `module` under `name`. Last registration wins.
    pub fn register(&mut self, name: &str, module: Module) {
        if self.modules.insert(name.to_owned(), module).is_some() {
            debug!(module = name, "module re-registered; previous bundle replaced");
        }
    }

    /// Looks up a module; a missing one is a `404` for the request at hand.
    pub fn resolve(&self, name: &str) -> Result<&Module, HttpError> {
        self.modules.get(name).ok_or_else(HttpError::not_found)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_finds_registered_modules() {
        let mut registry = ModuleRegistry::new();
        registry.register("widgets", Module::new().action("list", |ctx| ctx.ok("widgets")));

        let module = registry.resolve("widgets").expect("registered");
        assert!(module.actions().contains("list"));
        assert_eq!(registry.names().collect::<Vec<_>>(), ["widgets"]);
    }

    #[test]
    fn missing_modules_are_not_found() {
        let registry = ModuleRegistry::new();
        assert_eq!(registry.resolve("ghosts").map(|_| ()), Err(HttpError::not_found()));
    }

    #[test]
    fn last_registration_wins() {
        let mut registry = ModuleRegistry::new();
        registry.register("widgets", Module::new().action("list", |ctx| ctx.ok(1)));
        registry.register("widgets", Module::new().action("show", |ctx| ctx.ok(2)));

        let module = registry.resolve("widgets").expect("registered");
        assert!(module.actions().contains("show"));
        assert!(!module.actions().contains("list"));
        assert_eq!(registry.len(), 1);
    }
}
