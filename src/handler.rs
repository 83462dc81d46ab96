//! Actions, their type erasure, and lifecycle hooks.
//!
//! # How actions are stored
//!
//! An action is any function or closure with the signature
//!
//! ```text
//! fn name(ctx: &mut Context<'_>) -> Result<Value, Error>
//! ```
//!
//! Base actions and module actions have *different* concrete types but live
//! in one `HashMap`, so each is boxed once at registration time:
//!
//! ```text
//! fn list(ctx: &mut Context<'_>) -> Result<Value, Error> { … }   ← user writes this
//!        ↓ Module::new().action("list", list)
//! Arc::new(list)                                               ← heap-allocated once
//!        ↓  stored as BoxedAction = Arc<dyn Fn(&mut Context) -> …>
//! action(&mut ctx)  at request time                            ← one vtable call
//! ```
//!
//! Actions are synchronous. The transport has already read the whole body
//! before dispatch starts, and the lifecycle runs on a blocking-pool thread,
//! so an action is free to block.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::config::Config;
use crate::context::Context;
use crate::error::{Error, HttpError};
use crate::request::Request;
use crate::response::{Reply, Response};
use crate::router::NOT_FOUND_ACTION;

/// A type-erased action shared across concurrent requests.
pub type BoxedAction = Arc<dyn Fn(&mut Context<'_>) -> Result<Value, Error> + Send + Sync + 'static>;

// ── Actions ───────────────────────────────────────────────────────────────────

/// Named actions, either the base set of an [`App`](crate::App) or the
/// bundle of one [`Module`](crate::Module).
#[derive(Clone, Default)]
pub struct Actions {
    by_name: HashMap<String, BoxedAction>,
}

impl Actions {
    pub fn new() -> Self {
        Self::default()
    }

    /// The base set every app starts with: `ok`, `success` and
    /// `standard_response` answer `{status: 200, body: "OK"}`; `not_found`
    /// raises a `404`. Registering an action of the same name replaces them.
    pub(crate) fn builtin() -> Self {
        let mut actions = Self::new();
        for name in ["standard_response", "success", "ok"] {
            actions.insert(name, |_: &mut Context<'_>| Ok(Reply::ok("OK").into()));
        }
        actions.insert(NOT_FOUND_ACTION, |_: &mut Context<'_>| {
            Err(HttpError::not_found().into())
        });
        actions
    }

    /// Registers `action` under `name`. Last registration wins.
    pub fn insert<F>(&mut self, name: &str, action: F)
    where
        F: Fn(&mut Context<'_>) -> Result<Value, Error> + Send + Sync + 'static,
    {
        self.by_name.insert(name.to_owned(), Arc::new(action));
    }

    pub fn get(&self, name: &str) -> Option<&BoxedAction> {
        self.by_name.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl std::fmt::Debug for Actions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_set().entries(names).finish()
    }
}

// ── Hooks ─────────────────────────────────────────────────────────────────────

/// Optional lifecycle callbacks. Every method defaults to a no-op; implement
/// the ones you need and pass the value to
/// [`AppBuilder::hooks`](crate::AppBuilder::hooks).
///
/// Call order for one request:
///
/// ```text
/// before_run → [route] → before_call → action → after_call → [serialise] → after_run
/// ```
///
/// `before_call`/`after_call` may fail; their errors are handled exactly like
/// an action's.
pub trait Hooks: Send + Sync + 'static {
    /// Once, while the app is being built.
    fn startup(&self, _config: &Config) {}

    /// After filtering, before routing. `elapsed` counts from request start.
    fn before_run(&self, _req: &Request, _elapsed: Duration) {}

    /// Parameters are in place; the action has not run yet.
    fn before_call(&self, _ctx: &mut Context<'_>) -> Result<(), Error> {
        Ok(())
    }

    /// The action succeeded. Runs against the base context even for module
    /// routes.
    fn after_call(&self, _ctx: &mut Context<'_>) -> Result<(), Error> {
        Ok(())
    }

    /// The body is serialised. `elapsed` counts from request start.
    fn after_run(&self, _res: &Response, _elapsed: Duration) {}
}

/// Lets callers keep a handle on hooks they hand to the builder.
impl<H: Hooks + ?Sized> Hooks for Arc<H> {
    fn startup(&self, config: &Config) {
        (**self).startup(config)
    }

    fn before_run(&self, req: &Request, elapsed: Duration) {
        (**self).before_run(req, elapsed)
    }

    fn before_call(&self, ctx: &mut Context<'_>) -> Result<(), Error> {
        (**self).before_call(ctx)
    }

    fn after_call(&self, ctx: &mut Context<'_>) -> Result<(), Error> {
        (**self).after_call(ctx)
    }

    fn after_run(&self, res: &Response, elapsed: Duration) {
        (**self).after_run(res, elapsed)
    }
}

/// The hook set used when none is configured.
pub(crate) struct NoHooks;

impl Hooks for NoHooks {}
