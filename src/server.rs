//! HTTP transport and graceful shutdown.
//!
//! The server owns everything the lifecycle deliberately knows nothing
//! about: sockets, HTTP framing, reading bodies, signals. Each request is read
//! in full, handed to [`App::call`] on tokio's blocking pool (actions are
//! synchronous and may block), and the finished response is written back.
//!
//! # Graceful shutdown
//!
//! On **SIGTERM** or **Ctrl-C** the server:
//! 1. Immediately stops `listener.accept()`; no new connections are made.
//! 2. Lets every in-flight connection task run to completion.
//! 3. Returns from [`Server::serve`], which lets `main` exit cleanly.
//!
//! # Fail-hard
//!
//! When [`App::call`] reports a [`Fatal`](crate::Fatal) the process exits
//! with status 1 right away. Other in-flight requests are abandoned.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::instrument::WithSubscriber;
use tracing::{error, info, warn};

use crate::app::App;
use crate::error::{HttpError, ServeError};
use crate::request::Request;
use crate::response::{JSON_CONTENT_TYPE, Response};

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// # Panics
    ///
    /// Panics if `addr` is not a valid `host:port` string.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use halyard::Server;
    /// let server = Server::bind("0.0.0.0:3000");
    /// ```
    pub fn bind(addr: &str) -> Self {
        let addr: SocketAddr = addr.parse().expect("invalid socket address");
        Self { addr }
    }

    /// Starts accepting connections and running them through `app`.
    ///
    /// Returns only after a full graceful shutdown (SIGTERM or Ctrl-C,
    /// followed by all in-flight requests completing).
    pub async fn serve(self, app: App) -> Result<(), ServeError> {
        self.serve_with_shutdown(app, shutdown_signal()).await
    }

    /// Like [`serve`](Server::serve), but drains and returns when `signal`
    /// resolves instead of waiting for a process signal.
    pub async fn serve_with_shutdown(
        self,
        app: App,
        signal: impl Future<Output = ()> + Send,
    ) -> Result<(), ServeError> {
        match app.config().logger.clone() {
            Some(logger) => self.run(app, signal).with_subscriber(logger).await,
            None => self.run(app, signal).await,
        }
    }

    async fn run(self, app: App, signal: impl Future<Output = ()>) -> Result<(), ServeError> {
        let listener = TcpListener::bind(self.addr).await?;
        let app = Arc::new(app);

        info!(addr = %self.addr, "Listening on {}.", self.addr);

        let mut tasks = tokio::task::JoinSet::new();

        let shutdown = signal;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Check shutdown first so a SIGTERM stops accepting even when
                // more connections are queued.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "Shutting down {}.", std::process::id());
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let app = Arc::clone(&app);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // Called once per request on the connection, not once
                        // per connection.
                        let svc = service_fn(move |req| {
                            let app = Arc::clone(&app);
                            async move { handle(app, req, remote_addr).await }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    }.with_current_subscriber());
                }

                // Reap finished connection tasks so the JoinSet does not grow
                // without bound on long-running servers.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("Stopped.");
        Ok(())
    }
}

// ── Request handling ──────────────────────────────────────────────────────────

/// Reads one request, runs the lifecycle, and converts the result.
///
/// The error type is [`Infallible`](std::convert::Infallible): every failure
/// becomes a response here, so hyper never sees an error.
async fn handle(
    app: Arc<App>,
    req: hyper::Request<Incoming>,
    remote_addr: SocketAddr,
) -> Result<http::Response<Full<Bytes>>, std::convert::Infallible> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(peer = %remote_addr, "failed to read request body: {e}");
            return Ok(transport_error(HttpError::new(400, "Bad Request")).into_inner());
        }
    };

    let request = Request::builder(parts.method, &parts.uri.to_string())
        .headers(parts.headers)
        .remote_addr(remote_addr.ip().to_string())
        .body(body)
        .build();

    match tokio::task::spawn_blocking(move || app.call(request)).await {
        Ok(Ok(response)) => Ok(response.into_inner()),
        Ok(Err(fatal)) => {
            error!(pid = std::process::id(), "fail_hard is set; aborting after: {fatal}");
            std::process::exit(1);
        }
        Err(e) => {
            error!(peer = %remote_addr, "request task failed: {e}");
            Ok(transport_error(HttpError::new(500, "Internal Server Error")).into_inner())
        }
    }
}

/// A response for failures that happen outside the lifecycle.
fn transport_error(err: HttpError) -> Response {
    let mut res = Response::new();
    res.set_status(err.status());
    res.set_header("Content-Type", JSON_CONTENT_TYPE);
    if let Err(e) = res.write_json(&err.into_reply().into()) {
        error!("failed to encode transport error: {e}");
    }
    res
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** and **SIGINT** (Ctrl-C).
/// On Windows only Ctrl-C is available.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    // `pending()` never resolves: on non-Unix platforms the SIGTERM arm is
    // effectively disabled.
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
