//! The request lifecycle.
//!
//! [`App::call`] takes one routed-or-not request all the way to a finished
//! response:
//!
//! ```text
//! Started ─ filter ─▶ Filtered ─ route ─▶ Routed ─ dispatch ─▶ Dispatched ─▶ Finalized
//!    └──────────── forbidden: straight to serialisation ───────────────────────▲
//! ```
//!
//! Every call reaches `Finalized` exactly once, except when `fail_hard` turns
//! a defect into a [`Fatal`].

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::Lazy;
use serde_json::Value;
use tracing::{debug, error, info, info_span, warn};

use crate::config::Config;
use crate::context::Context;
use crate::dispatch::Dispatcher;
use crate::error::{Error, Fatal};
use crate::filter;
use crate::handler::{Actions, Hooks, NoHooks};
use crate::module::{Module, ModuleRegistry};
use crate::request::Request;
use crate::response::{JSON_CONTENT_TYPE, Reply, Response, server_signature};
use crate::router::{Route, Router, Routing};

/// Lifecycle states of one call.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Phase {
    Started,
    Filtered,
    Routed,
    Dispatched,
    Finalized,
}

fn enter(phase: Phase) {
    debug!(?phase, "lifecycle");
}

// ── App ───────────────────────────────────────────────────────────────────────

/// A configured application: immutable, shareable across threads, one per
/// server.
pub struct App {
    config: Config,
    dispatcher: Dispatcher,
    router: Box<dyn Routing>,
}

impl App {
    /// Starts building an app on top of `config`.
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder {
            config,
            actions: Actions::builtin(),
            modules: ModuleRegistry::new(),
            hooks: Arc::new(NoHooks),
            router: Box::new(Router::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Runs one request through filter, routing, dispatch and serialisation.
    ///
    /// Always answers with a response, except when a defect occurs while
    /// `fail_hard` is on: the defect is logged and returned as [`Fatal`], and
    /// the caller is expected to stop serving.
    pub fn call(&self, req: Request) -> Result<Response, Fatal> {
        match &self.config.logger {
            Some(logger) => tracing::dispatcher::with_default(logger, || self.run(&req)),
            None => self.run(&req),
        }
    }

    fn run(&self, req: &Request) -> Result<Response, Fatal> {
        let started = Instant::now();
        let span = info_span!("request", method = %req.method(), uri = %req.uri());
        let _entered = span.enter();
        enter(Phase::Started);

        let mut ctx = Context::new(&self.config, req);

        let outcome = guarded(|| self.handle(&mut ctx, started));

        let value = match outcome {
            Ok(value) => value,
            Err(defect) => self.defect(defect, ctx.response_mut())?,
        };
        if let Err(e) = ctx.response_mut().write_json(&value) {
            let fallback = self.defect(e.into(), ctx.response_mut())?;
            let _ = ctx.response_mut().write_json(&fallback);
        }

        // The body is already written; a failing hook is logged but does not
        // change what the client receives.
        let ran = guarded(|| {
            self.dispatcher.hooks.after_run(ctx.response(), started.elapsed());
            Ok(())
        });
        if let Err(defect) = ran {
            self.report(&defect)?;
        }

        let elapsed = started.elapsed().as_secs_f64();
        info!("{}", access_line(ctx.response().status(), req.uri(), ctx.route(), elapsed));
        enter(Phase::Finalized);

        Ok(ctx.into_response())
    }

    /// Filter, tag, route and dispatch. Taxonomy errors are already replies
    /// by the time this returns; `Err` means a defect.
    fn handle(&self, ctx: &mut Context<'_>, started: Instant) -> Result<Value, Error> {
        let req = ctx.request();
        let admitted = filter::check(req, &self.config.allow_from);

        let res = ctx.response_mut();
        res.set_header("Content-Type", JSON_CONTENT_TYPE);
        res.set_header("User-Agent", server_signature());

        if let Err(err) = admitted {
            warn!("{} => {}", req.path(), err);
            ctx.response_mut().set_status(err.status());
            return Ok(err.into_reply().into());
        }
        enter(Phase::Filtered);

        self.dispatcher.hooks.before_run(req, started.elapsed());

        let route = self.router.route(req);
        ctx.attach_route(route.clone());
        enter(Phase::Routed);

        let value = self.dispatcher.dispatch(ctx, &route)?;
        enter(Phase::Dispatched);
        Ok(value)
    }

    /// Logs a defect and produces the generic 500 reply, or the [`Fatal`]
    /// when `fail_hard` is on.
    fn defect(&self, err: Error, res: &mut Response) -> Result<Value, Fatal> {
        res.set_status(500);
        self.report(&err)?;
        Ok(Reply::internal_error().into())
    }

    /// Logs a defect with its backtrace; under `fail_hard` it becomes fatal.
    fn report(&self, err: &Error) -> Result<(), Fatal> {
        let backtrace = err.backtrace();
        error!(%backtrace, "{err}");

        if self.config.fail_hard {
            return Err(Fatal { message: err.to_string(), backtrace });
        }
        Ok(())
    }
}

/// `[200] /widgets?page=2 => widgets::list (0.0029s;343.79req/s)`
///
/// The module segment is omitted for module-less routes; requests rejected
/// before routing show `-` in place of the action.
pub(crate) fn access_line(status: u16, uri: &str, route: Option<&Route>, secs: f64) -> String {
    let target = match route {
        Some(Route { module: Some(module), action, .. }) => format!("{module}::{action}"),
        Some(route) => route.action.clone(),
        None => "-".to_owned(),
    };
    let req_time = (secs * 1e4).round() / 1e4;
    let req_per_sec = ((1.0 / secs) * 1e2).round() / 1e2;
    format!(
        "[{status}] {uri} => {target} ({}s;{}req/s)",
        decimal(req_time),
        decimal(req_per_sec)
    )
}

/// Whole numbers keep a trailing `.0`, so `2` prints as `2.0`.
fn decimal(x: f64) -> String {
    let text = x.to_string();
    if x.is_finite() && !text.contains('.') { format!("{text}.0") } else { text }
}

thread_local! {
    static PANIC_TRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Chains onto the existing panic hook and keeps a backtrace of the panic
/// site for the panicking thread.
static PANIC_HOOK: Lazy<()> = Lazy::new(|| {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let trace = Backtrace::force_capture().to_string();
        let _ = PANIC_TRACE.try_with(|slot| *slot.borrow_mut() = Some(trace));
        previous(info);
    }));
});

/// Runs `f`, turning a panic into [`Error::Panicked`].
fn guarded<T>(f: impl FnOnce() -> Result<T, Error>) -> Result<T, Error> {
    Lazy::force(&PANIC_HOOK);
    PANIC_TRACE.with(|slot| slot.borrow_mut().take());

    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        let trace = PANIC_TRACE
            .with(|slot| slot.borrow_mut().take())
            .unwrap_or_else(|| Backtrace::force_capture().to_string());
        Err(Error::Panicked { message: panic_message(&*payload), trace })
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

// ── AppBuilder ────────────────────────────────────────────────────────────────

/// Collects actions, modules, hooks and the router before serving starts.
///
/// ```rust
/// use halyard::{App, Config, Method, Module, Route, Router};
/// use serde_json::json;
///
/// let app = App::builder(Config::default())
///     .action("index", |ctx| ctx.ok("welcome"))
///     .module("widgets", Module::new().action("list", |ctx| ctx.ok(json!([1, 2, 3]))))
///     .router(
///         Router::new()
///             .on(Method::GET, "/", "index")
///             .on(Method::GET, "/widgets", Route::module("widgets", "list")),
///     )
///     .build();
/// ```
pub struct AppBuilder {
    config: Config,
    actions: Actions,
    modules: ModuleRegistry,
    hooks: Arc<dyn Hooks>,
    router: Box<dyn Routing>,
}

impl AppBuilder {
    /// Registers a base action. Replaces a builtin or earlier action of the
    /// same name.
    pub fn action<F>(mut self, name: &str, action: F) -> Self
    where
        F: Fn(&mut Context<'_>) -> Result<Value, Error> + Send + Sync + 'static,
    {
        self.actions.insert(name, action);
        self
    }

    /// Registers a module. Last registration of a name wins.
    pub fn module(mut self, name: &str, module: Module) -> Self {
        self.modules.register(name, module);
        self
    }

    pub fn hooks(mut self, hooks: impl Hooks) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    pub fn router(mut self, router: impl Routing) -> Self {
        self.router = Box::new(router);
        self
    }

    /// Freezes everything and runs the `startup` hook.
    pub fn build(self) -> App {
        let app = App {
            dispatcher: Dispatcher::new(self.actions, self.modules, self.hooks),
            router: self.router,
            config: self.config,
        };

        let startup = || {
            info!("Starting up...");
            app.dispatcher.hooks.startup(&app.config);
            info!(
                app = %app.config.app,
                modules = app.dispatcher.modules.len(),
                actions = app.dispatcher.actions.len(),
                "Started."
            );
        };
        match &app.config.logger {
            Some(logger) => tracing::dispatcher::with_default(logger, startup),
            None => startup(),
        }

        app
    }
}
