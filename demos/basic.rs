//! Minimal halyard example: a module of widget actions plus a couple of base
//! actions.
//!
//! Run with:
//!   cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/
//!   curl http://localhost:3000/widgets
//!   curl http://localhost:3000/widgets/2?verbose=1
//!   curl http://localhost:3000/widgets/99
//!   curl -X POST http://localhost:3000/widgets -d '{"name":"flange"}'
//!   curl http://localhost:3000/nowhere

use halyard::{
    AccessPolicy, App, Config, Context, Error, Method, Module, Route, Router, Server, logging,
};
use serde::Deserialize;
use serde_json::{Value, json};

const WIDGETS: [&str; 3] = ["sprocket", "gear", "cam"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config {
        app: "widgets-demo".into(),
        allow_from: AccessPolicy::LocalOnly,
        ..Config::default()
    };
    config.logger = Some(logging::stdout_dispatch(&config)?);

    let widgets = Module::new()
        .action("list", list)
        .action("show", show)
        .action("create", create);

    let app = App::builder(config)
        .action("index", |ctx| ctx.ok("widgets demo"))
        .module("widgets", widgets)
        .router(
            Router::new()
                .on(Method::GET,  "/",              "index")
                .on(Method::GET,  "/widgets",       Route::module("widgets", "list"))
                .on(Method::GET,  "/widgets/{id}",  Route::module("widgets", "show"))
                .on(Method::POST, "/widgets",       Route::module("widgets", "create")),
        )
        .build();

    Server::bind("127.0.0.1:3000").serve(app).await?;
    Ok(())
}

// GET /widgets
fn list(ctx: &mut Context<'_>) -> Result<Value, Error> {
    ctx.ok(json!(WIDGETS))
}

// GET /widgets/{id}
//
// Unknown ids raise a 404 through the error taxonomy; the dispatcher turns
// it into `{"status":404,"body":"Not Found"}`.
fn show(ctx: &mut Context<'_>) -> Result<Value, Error> {
    let found = ctx
        .param("id")
        .and_then(|id| id.parse::<usize>().ok())
        .and_then(|id| WIDGETS.get(id));

    match found {
        Some(name) if ctx.param("verbose").is_some() => ctx.ok(json!({"name": name, "stock": 12})),
        Some(name) => ctx.ok(*name),
        None => ctx.not_found(Value::Null),
    }
}

#[derive(Deserialize)]
struct NewWidget {
    name: String,
}

// POST /widgets
fn create(ctx: &mut Context<'_>) -> Result<Value, Error> {
    let input: NewWidget = ctx.json_body()?;
    ctx.response_mut().set_status(201);
    ctx.response_mut().set_header("location", "/widgets/3");
    ctx.ok(json!({"id": 3, "name": input.name}))
}
