//! Action dispatch.
//!
//! Turns a [`Route`] into the value an action returned:
//!
//! 1. parameters = route params (minus `action`/`module`) overridden by query params
//! 2. `before_call` hook
//! 3. module-less: run the base action; module: resolve the bundle and run
//!    the action against a scoped copy of the context
//! 4. `after_call` hook
//! 5. parameters reset to empty, whatever happened
//!
//! Taxonomy errors stop here: they are logged at warn level, set the response
//! status and come back as an ordinary `{status, body}` value. Only defects
//! propagate to the caller.

use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::context::Context;
use crate::error::Error;
use crate::handler::{Actions, BoxedAction, Hooks};
use crate::module::ModuleRegistry;
use crate::router::{Params, Route};

/// Route keys that never become action parameters.
const RESERVED_KEYS: [&str; 2] = ["action", "module"];

/// Base actions, modules and hooks of one app. Immutable while serving.
pub struct Dispatcher {
    pub(crate) actions: Actions,
    pub(crate) modules: ModuleRegistry,
    pub(crate) hooks: Arc<dyn Hooks>,
}

impl Dispatcher {
    pub fn new(actions: Actions, modules: ModuleRegistry, hooks: Arc<dyn Hooks>) -> Self {
        Self { actions, modules, hooks }
    }

    /// Runs the action `route` names against `ctx`.
    ///
    /// Returns `Err` only for defects: an undefined action, or any
    /// non-taxonomy failure raised by an action or hook.
    pub fn dispatch(&self, ctx: &mut Context<'_>, route: &Route) -> Result<Value, Error> {
        let outcome = self.invoke(ctx, route);
        ctx.params.clear();

        match outcome {
            Err(Error::Http(err)) => {
                warn!("{} => {}", ctx.uri(), err);
                ctx.response_mut().set_status(err.status());
                Ok(err.into_reply().into())
            }
            other => other,
        }
    }

    fn invoke(&self, ctx: &mut Context<'_>, route: &Route) -> Result<Value, Error> {
        ctx.params = params_for(route, ctx.query_params());

        self.hooks.before_call(ctx)?;

        let value = match route.module.as_deref() {
            None => {
                let action = self.actions.get(&route.action).ok_or_else(|| unknown(route))?;
                action(&mut *ctx)?
            }
            Some(name) => {
                let module = self.modules.resolve(name)?;
                let action = self.module_action(module.actions(), route)?;
                let mut scoped = ctx.scoped();
                let result = action(&mut scoped);
                ctx.absorb(scoped);
                result?
            }
        };

        self.hooks.after_call(ctx)?;
        Ok(value)
    }

    /// A scoped copy is still a copy of the base context, so base actions
    /// answer when the bundle does not.
    fn module_action<'s>(&'s self, bundle: &'s Actions, route: &Route) -> Result<&'s BoxedAction, Error> {
        bundle
            .get(&route.action)
            .or_else(|| self.actions.get(&route.action))
            .ok_or_else(|| unknown(route))
    }
}

fn params_for(route: &Route, query: Params) -> Params {
    let mut params: Params = route
        .params
        .iter()
        .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    params.extend(query);
    params
}

fn unknown(route: &Route) -> Error {
    Error::UnknownAction { action: route.action.clone(), module: route.module.clone() }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use anyhow::anyhow;
    use http::Method;
    use serde_json::json;

    use super::*;
    use crate::config::Config;
    use crate::error::HttpError;
    use crate::handler::NoHooks;
    use crate::module::Module;
    use crate::request::Request;

    fn dispatcher(hooks: Arc<dyn Hooks>) -> Dispatcher {
        let mut actions = Actions::builtin();
        actions.insert("echo", |ctx| Ok(json!(ctx.params())));
        actions.insert("explode", |_| Err(anyhow!("disk on fire").into()));
        actions.insert("teapot", |_| Err(HttpError::new(418, "short and stout").into()));

        let mut modules = ModuleRegistry::new();
        modules.register(
            "widgets",
            Module::new()
                .action("list", |ctx| {
                    ctx.params_mut().insert("scratch".into(), "module-only".into());
                    ctx.response_mut().set_header("x-widgets", "3");
                    ctx.ok(json!([1, 2, 3]))
                })
                .action("leak", |ctx| Ok(json!(ctx.param("scratch")))),
        );
        Dispatcher::new(actions, modules, hooks)
    }

    fn request(uri: &str) -> Request {
        Request::builder(Method::GET, uri).build()
    }

    #[test]
    fn module_less_routes_return_the_action_result_unchanged() {
        let config = Config::default();
        let req = request("/");
        let mut ctx = Context::new(&config, &req);

        let value = dispatcher(Arc::new(NoHooks)).dispatch(&mut ctx, &Route::action("ok")).expect("ok");
        assert_eq!(value, json!({"status": 200, "body": "OK"}));
        assert_eq!(ctx.response().status(), 200);
    }

    #[test]
    fn undefined_actions_are_defects() {
        let config = Config::default();
        let req = request("/");
        let mut ctx = Context::new(&config, &req);

        let err = dispatcher(Arc::new(NoHooks))
            .dispatch(&mut ctx, &Route::action("missing_thing"))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownAction { .. }));
        assert!(!err.is_taxonomy());
    }

    #[test]
    fn undefined_module_actions_are_defects() {
        let config = Config::default();
        let req = request("/");
        let mut ctx = Context::new(&config, &req);

        let err = dispatcher(Arc::new(NoHooks))
            .dispatch(&mut ctx, &Route::module("widgets", "destroy_all"))
            .unwrap_err();
        assert_eq!(err.to_string(), "undefined action `widgets::destroy_all`");
    }

    #[test]
    fn module_actions_fall_back_to_base_actions() {
        let config = Config::default();
        let req = request("/");
        let mut ctx = Context::new(&config, &req);

        let value = dispatcher(Arc::new(NoHooks))
            .dispatch(&mut ctx, &Route::module("widgets", "success"))
            .expect("ok");
        assert_eq!(value["body"], json!("OK"));
    }

    #[test]
    fn unknown_modules_answer_404() {
        let config = Config::default();
        let req = request("/");
        let mut ctx = Context::new(&config, &req);

        let value = dispatcher(Arc::new(NoHooks))
            .dispatch(&mut ctx, &Route::module("gadgets", "list"))
            .expect("taxonomy errors are answered");
        assert_eq!(value, json!({"status": 404, "body": "Not Found"}));
        assert_eq!(ctx.response().status(), 404);
    }

    #[test]
    fn taxonomy_errors_become_replies() {
        let config = Config::default();
        let req = request("/kettle");
        let mut ctx = Context::new(&config, &req);

        let value = dispatcher(Arc::new(NoHooks)).dispatch(&mut ctx, &Route::action("teapot")).expect("answered");
        assert_eq!(value, json!({"status": 418, "body": "short and stout"}));
        assert_eq!(ctx.response().status(), 418);
        assert!(ctx.params().is_empty());
    }

    #[test]
    fn defects_propagate() {
        let config = Config::default();
        let req = request("/");
        let mut ctx = Context::new(&config, &req);

        let err = dispatcher(Arc::new(NoHooks)).dispatch(&mut ctx, &Route::action("explode")).unwrap_err();
        assert_eq!(err.to_string(), "disk on fire");
        assert!(ctx.params().is_empty());
    }

    #[test]
    fn query_params_override_route_params() {
        let config = Config::default();
        let req = request("/echo?id=query&page=2");
        let mut ctx = Context::new(&config, &req);
        let route = Route::action("echo")
            .param("id", "route")
            .param("kind", "gear")
            .param("module", "ignored")
            .param("action", "ignored");

        let value = dispatcher(Arc::new(NoHooks)).dispatch(&mut ctx, &route).expect("echo");
        assert_eq!(value, json!({"id": "query", "kind": "gear", "page": "2"}));
    }

    #[test]
    fn module_params_stay_in_the_scoped_copy() {
        let config = Config::default();
        let req = request("/widgets?page=1");
        let mut ctx = Context::new(&config, &req);
        let dispatcher = dispatcher(Arc::new(NoHooks));

        let value = dispatcher.dispatch(&mut ctx, &Route::module("widgets", "list")).expect("list");
        assert_eq!(value["body"], json!([1, 2, 3]));
        assert!(ctx.params().is_empty());
        assert_eq!(ctx.response().header("x-widgets"), Some("3"));

        // A second call on the same context sees nothing from the first.
        let value = dispatcher.dispatch(&mut ctx, &Route::module("widgets", "leak")).expect("leak");
        assert_eq!(value, Value::Null);
        assert!(ctx.params().is_empty());
    }

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl Hooks for Recorder {
        fn before_call(&self, ctx: &mut Context<'_>) -> Result<(), Error> {
            let mut calls = self.calls.lock().expect("lock");
            calls.push(format!("before:{}", ctx.params().len()));
            Ok(())
        }

        fn after_call(&self, ctx: &mut Context<'_>) -> Result<(), Error> {
            let mut calls = self.calls.lock().expect("lock");
            calls.push(format!("after:{}", ctx.params().len()));
            Ok(())
        }
    }

    #[test]
    fn hooks_wrap_the_action_on_the_base_context() {
        let config = Config::default();
        let req = request("/widgets?page=1");
        let mut ctx = Context::new(&config, &req);
        let recorder = Arc::new(Recorder::default());

        dispatcher(recorder.clone())
            .dispatch(&mut ctx, &Route::module("widgets", "list"))
            .expect("list");

        // The module wrote `scratch` on its copy; the base still holds `page` only.
        let calls = recorder.calls.lock().expect("lock").clone();
        assert_eq!(calls, ["before:1", "after:1"]);
    }

    #[test]
    fn after_call_is_skipped_when_the_action_fails() {
        let config = Config::default();
        let req = request("/");
        let mut ctx = Context::new(&config, &req);
        let recorder = Arc::new(Recorder::default());

        dispatcher(recorder.clone()).dispatch(&mut ctx, &Route::action("not_found")).expect("answered");

        let calls = recorder.calls.lock().expect("lock").clone();
        assert_eq!(calls, ["before:0"]);
    }

    struct Gatekeeper;

    impl Hooks for Gatekeeper {
        fn before_call(&self, ctx: &mut Context<'_>) -> Result<(), Error> {
            match ctx.param("token") {
                Some("letmein") => Ok(()),
                _ => Err(HttpError::forbidden().into()),
            }
        }
    }

    #[test]
    fn before_call_can_reject_with_a_taxonomy_error() {
        let config = Config::default();
        let req = request("/?token=guess");
        let mut ctx = Context::new(&config, &req);

        let value = dispatcher(Arc::new(Gatekeeper)).dispatch(&mut ctx, &Route::action("ok")).expect("answered");
        assert_eq!(value, json!({"status": 403, "body": "Forbidden"}));
        assert!(ctx.params().is_empty());
    }
}
