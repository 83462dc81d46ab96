//! # halyard
//!
//! The request-dispatch core of a small JSON-API server. Nothing more.
//!
//! ## The contract
//!
//! One request goes in, one JSON response comes out, one access-log line is
//! written:
//!
//! 1. **Filter**: the configured [`AccessPolicy`] admits or forbids the request.
//! 2. **Route**: a [`Routing`] implementation picks the action, and optionally
//!    the [`Module`] it lives in.
//! 3. **Dispatch**: the action runs against a fresh [`Context`]; module actions
//!    run against an isolated copy of it.
//! 4. **Answer**: the returned value is serialised. Expected failures
//!    ([`HttpError`]) become their own status and body; anything else becomes
//!    a generic `500`, or takes the process down when `fail_hard` is set.
//!
//! Transport, TLS, body limits and process management stay outside; the
//! bundled [`Server`] is a thin hyper binding.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use halyard::{App, Config, Context, Error, Method, Module, Route, Router, Server};
//! use serde_json::{Value, json};
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = App::builder(Config::default())
//!         .action("index", |ctx| ctx.ok("welcome"))
//!         .module("widgets", Module::new().action("show", show_widget))
//!         .router(
//!             Router::new()
//!                 .on(Method::GET, "/",             "index")
//!                 .on(Method::GET, "/widgets/{id}", Route::module("widgets", "show")),
//!         )
//!         .build();
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//!
//! fn show_widget(ctx: &mut Context<'_>) -> Result<Value, Error> {
//!     match ctx.param("id") {
//!         Some("7") => ctx.ok(json!({"id": 7, "name": "sprocket"})),
//!         _ => ctx.not_found(Value::Null),
//!     }
//! }
//! ```

mod app;
mod config;
mod context;
mod dispatch;
mod error;
mod filter;
mod handler;
mod module;
mod request;
mod response;
mod router;
mod server;

pub mod logging;

pub use app::{App, AppBuilder};
pub use config::{AccessPolicy, Config, LogFormat};
pub use context::Context;
pub use dispatch::Dispatcher;
pub use error::{Error, Fatal, HttpError, ServeError};
pub use filter::{LOOPBACK_ADDRS, check as check_access};
pub use handler::{Actions, BoxedAction, Hooks};
pub use http::Method;
pub use module::{Module, ModuleRegistry};
pub use request::{Request, RequestBuilder};
pub use response::{JSON_CONTENT_TYPE, Reply, Response, server_signature};
pub use router::{NOT_FOUND_ACTION, Params, Route, Router, Routing};
pub use server::Server;
