//! Per-call handler context.
//!
//! A [`Context`] is what actions run against: configuration and request are
//! borrowed, parameters and the response-in-progress are owned. The
//! lifecycle builds a fresh one for every call, so two in-flight requests
//! never share one.
//!
//! Module actions run against a *scoped* copy: same configuration and
//! request, but its own parameter set and its own response view. When the
//! module action returns, the response view is folded back into the base
//! context and the copy's parameters are dropped with it.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::Config;
use crate::error::{Error, HttpError};
use crate::request::Request;
use crate::response::{Reply, Response};
use crate::router::{Params, Route};

pub struct Context<'a> {
    config: &'a Config,
    request: &'a Request,
    route: Option<Route>,
    pub(crate) params: Params,
    response: Response,
}

impl<'a> Context<'a> {
    /// A context with an empty parameter set and a fresh `200` response.
    pub fn new(config: &'a Config, request: &'a Request) -> Self {
        Self {
            config,
            request,
            route: None,
            params: Params::new(),
            response: Response::new(),
        }
    }

    pub fn config(&self) -> &'a Config { self.config }
    pub fn request(&self) -> &'a Request { self.request }

    /// The route resolved for this call, once routing has happened.
    pub fn route(&self) -> Option<&Route> { self.route.as_ref() }

    pub fn params(&self) -> &Params { &self.params }
    pub fn params_mut(&mut self) -> &mut Params { &mut self.params }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn response(&self) -> &Response { &self.response }
    pub fn response_mut(&mut self) -> &mut Response { &mut self.response }

    /// Request path, without scheme, host, port or query.
    pub fn uri(&self) -> &'a str { self.request.path() }
    pub fn method(&self) -> &'a http::Method { self.request.method() }

    pub fn query_params(&self) -> Params { self.request.query_params() }
    pub fn form_params(&self) -> Params { self.request.form_params() }

    pub fn json_body<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        self.request.json_body()
    }

    /// `{status: 200, body}`.
    pub fn ok(&self, body: impl Into<Value>) -> Result<Value, Error> {
        Ok(Reply::ok(body).into())
    }

    /// Raises a `404`. A null or empty-object body becomes `"Not Found"`.
    pub fn not_found(&self, body: impl Into<Value>) -> Result<Value, Error> {
        let body = match body.into() {
            Value::Null => Value::from("Not Found"),
            Value::Object(map) if map.is_empty() => Value::from("Not Found"),
            body => body,
        };
        Err(HttpError::NotFound(body).into())
    }

    pub(crate) fn attach_route(&mut self, route: Route) {
        self.route = Some(route);
    }

    /// The isolated copy module actions run against.
    pub(crate) fn scoped(&self) -> Context<'a> {
        Context {
            config: self.config,
            request: self.request,
            route: self.route.clone(),
            params: self.params.clone(),
            response: self.response.clone(),
        }
    }

    /// Takes over the response view of a scoped copy. Its parameters are
    /// discarded.
    pub(crate) fn absorb(&mut self, scoped: Context<'a>) {
        self.response = scoped.response;
    }

    pub(crate) fn into_response(self) -> Response {
        self.response
    }
}

impl std::fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("uri", &self.request.uri())
            .field("route", &self.route)
            .field("params", &self.params)
            .field("status", &self.response.status())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use http::Method;
    use serde_json::json;

    use super::*;

    #[test]
    fn scoped_copies_share_config_and_request_but_not_params() {
        let config = Config::default();
        let req = Request::builder(Method::GET, "/widgets").build();
        let mut base = Context::new(&config, &req);
        base.params_mut().insert("page".into(), "1".into());

        let mut scoped = base.scoped();
        scoped.params_mut().insert("secret".into(), "x".into());
        scoped.response_mut().set_status(201);

        assert!(std::ptr::eq(scoped.config(), base.config()));
        assert!(std::ptr::eq(scoped.request(), base.request()));
        assert_eq!(base.param("secret"), None);

        base.absorb(scoped);
        assert_eq!(base.response().status(), 201);
        assert_eq!(base.param("secret"), None);
        assert_eq!(base.param("page"), Some("1"));
    }

    #[test]
    fn not_found_defaults_empty_bodies() {
        let config = Config::default();
        let req = Request::builder(Method::GET, "/").build();
        let ctx = Context::new(&config, &req);

        for body in [Value::Null, json!({})] {
            match ctx.not_found(body) {
                Err(Error::Http(err)) => assert_eq!(err.body(), &json!("Not Found")),
                other => panic!("expected a 404, got {other:?}"),
            }
        }
        match ctx.not_found("no such widget") {
            Err(Error::Http(err)) => assert_eq!(err.to_string(), "no such widget"),
            other => panic!("expected a 404, got {other:?}"),
        }
    }

    #[test]
    fn ok_wraps_the_body() {
        let config = Config::default();
        let req = Request::builder(Method::GET, "/").build();
        let ctx = Context::new(&config, &req);
        assert_eq!(ctx.ok(json!([1, 2])).expect("ok"), json!({"status": 200, "body": [1, 2]}));
    }
}
