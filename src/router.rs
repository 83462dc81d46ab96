//! Route resolution.
//!
//! The lifecycle only needs *something* that turns a [`Request`] into a
//! [`Route`]: that is the [`Routing`] trait. Any `Fn(&Request) -> Route`
//! qualifies. [`Router`] is the stock implementation: one radix tree per HTTP
//! method, O(path-length) lookup, unmatched requests fall through to the
//! `not_found` action.

use std::collections::HashMap;

use http::Method;
use matchit::Router as MatchitRouter;

use crate::request::Request;

/// Route and query parameters handed to actions.
pub type Params = HashMap<String, String>;

/// Action every unmatched request is routed to, unless overridden with
/// [`Router::default_to`].
pub const NOT_FOUND_ACTION: &str = "not_found";

// ── Route descriptor ──────────────────────────────────────────────────────────

/// Which action (in which module, if any) handles a request, plus the
/// parameters extracted while matching.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Route {
    pub action: String,
    pub module: Option<String>,
    pub params: Params,
}

impl Route {
    /// A module-less route.
    pub fn action(action: impl Into<String>) -> Self {
        Self { action: action.into(), module: None, params: Params::new() }
    }

    /// A route into `module`.
    pub fn module(module: impl Into<String>, action: impl Into<String>) -> Self {
        Self { action: action.into(), module: Some(module.into()), params: Params::new() }
    }

    pub fn not_found() -> Self {
        Self::action(NOT_FOUND_ACTION)
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

// ── Routing ───────────────────────────────────────────────────────────────────

/// Maps a request to a route. Must always produce an action.
pub trait Routing: Send + Sync + 'static {
    fn route(&self, req: &Request) -> Route;
}

impl<F> Routing for F
where
    F: Fn(&Request) -> Route + Send + Sync + 'static,
{
    fn route(&self, req: &Request) -> Route {
        self(req)
    }
}

// ── Router ────────────────────────────────────────────────────────────────────

/// The stock router.
///
/// Build it once at startup and pass it to
/// [`AppBuilder::router`](crate::AppBuilder::router). Each [`Router::on`] call
/// returns `self` so registrations chain naturally.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<Route>>,
    fallback: Route,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new(), fallback: Route::not_found() }
    }

    /// Registers `target` for a method + path pair. Returns `self` for chaining.
    ///
    /// Path parameters use `{name}` syntax and end up in the action's
    /// parameter set. A `&str` target is a module-less action; use
    /// [`Route::module`] for module actions and [`Route::param`] for fixed
    /// parameters:
    ///
    /// ```rust
    /// use halyard::{Method, Route, Router};
    ///
    /// Router::new()
    ///     .on(Method::GET,  "/",              "index")
    ///     .on(Method::GET,  "/widgets",       Route::module("widgets", "list"))
    ///     .on(Method::GET,  "/widgets/{id}",  Route::module("widgets", "show"))
    ///     .on(Method::POST, "/widgets",       Route::module("widgets", "create").param("source", "api"));
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid pattern or conflicts with an earlier
    /// registration. Routes are fixed at startup, so this is a programming
    /// error.
    pub fn on(mut self, method: Method, path: &str, target: impl Into<Route>) -> Self {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, target.into())
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    /// Replaces the route unmatched requests resolve to.
    pub fn default_to(mut self, target: impl Into<Route>) -> Self {
        self.fallback = target.into();
        self
    }

    pub(crate) fn lookup(&self, method: &Method, path: &str) -> Option<Route> {
        let tree = self.routes.get(method)?;
        let matched = tree.at(path).ok()?;
        let mut route = matched.value.clone();
        route.params.extend(
            matched.params.iter().map(|(k, v)| (k.to_owned(), v.to_owned())),
        );
        Some(route)
    }
}

impl Routing for Router {
    fn route(&self, req: &Request) -> Route {
        self.lookup(req.method(), req.path())
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

impl From<&str> for Route {
    fn from(action: &str) -> Self { Route::action(action) }
}

impl From<String> for Route {
    fn from(action: String) -> Self { Route::action(action) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> Router {
        Router::new()
            .on(Method::GET, "/", "index")
            .on(Method::GET, "/widgets/{id}", Route::module("widgets", "show").param("format", "full"))
    }

    #[test]
    fn resolves_module_less_routes() {
        let req = Request::builder(Method::GET, "/").build();
        assert_eq!(router().route(&req), Route::action("index"));
    }

    #[test]
    fn path_parameters_join_the_fixed_ones() {
        let req = Request::builder(Method::GET, "/widgets/42?verbose=1").build();
        let route = router().route(&req);
        assert_eq!(route.module.as_deref(), Some("widgets"));
        assert_eq!(route.action, "show");
        assert_eq!(route.params.get("id").map(String::as_str), Some("42"));
        assert_eq!(route.params.get("format").map(String::as_str), Some("full"));
    }

    #[test]
    fn unmatched_requests_fall_back_to_not_found() {
        let req = Request::builder(Method::DELETE, "/widgets/42").build();
        assert_eq!(router().route(&req), Route::not_found());
    }

    #[test]
    fn fallback_is_configurable() {
        let req = Request::builder(Method::GET, "/nowhere").build();
        let router = router().default_to(Route::module("errors", "missing"));
        assert_eq!(router.route(&req), Route::module("errors", "missing"));
    }

    #[test]
    fn closures_are_routers() {
        let fixed = |_: &Request| Route::action("ok");
        let req = Request::builder(Method::GET, "/anything").build();
        assert_eq!(fixed.route(&req).action, "ok");
    }
}
