//! Error types.
//!
//! Two tiers, kept apart by the type system:
//!
//! - [`HttpError`] is the closed taxonomy of *expected* per-request failures.
//!   Each kind carries a status code and a body and is turned into a
//!   `{status, body}` reply at the dispatch boundary.
//! - Everything else is a defect. Actions signal one through
//!   [`Error::Defect`] (or [`Error::UnknownAction`] when a route names an
//!   action that does not exist). Defects always become a generic 500.
//!
//! [`Fatal`] is what [`App::call`](crate::App::call) hands back instead of a
//! response when `fail_hard` is on and a defect occurred.

use std::backtrace::{Backtrace, BacktraceStatus};

use serde_json::Value;
use thiserror::Error;

use crate::response::Reply;

// ── Taxonomy ──────────────────────────────────────────────────────────────────

/// An expected, recoverable per-request failure.
#[derive(Clone, Debug, PartialEq)]
pub enum HttpError {
    /// `404`.
    NotFound(Value),
    /// `403`.
    Forbidden(Value),
    /// Any other application-defined status and body.
    Other { status: u16, body: Value },
}

impl HttpError {
    /// `404` with the default `"Not Found"` body.
    pub fn not_found() -> Self {
        Self::NotFound(Value::from("Not Found"))
    }

    /// `403` with the default `"Forbidden"` body.
    pub fn forbidden() -> Self {
        Self::Forbidden(Value::from("Forbidden"))
    }

    /// Builds an error of any status. `404` and `403` map onto their
    /// dedicated kinds so matching on the kind stays reliable.
    pub fn new(status: u16, body: impl Into<Value>) -> Self {
        let body = body.into();
        match status {
            404 => Self::NotFound(body),
            403 => Self::Forbidden(body),
            _ => Self::Other { status, body },
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Forbidden(_) => 403,
            Self::Other { status, .. } => *status,
        }
    }

    pub fn body(&self) -> &Value {
        match self {
            Self::NotFound(body) | Self::Forbidden(body) | Self::Other { body, .. } => body,
        }
    }

    /// The standard `{status, body}` shape written back to the client.
    pub fn into_reply(self) -> Reply {
        let status = self.status();
        match self {
            Self::NotFound(body) | Self::Forbidden(body) | Self::Other { body, .. } => {
                Reply { status, body }
            }
        }
    }
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.body() {
            Value::String(text) => f.write_str(text),
            other => write!(f, "{other}"),
        }
    }
}

impl std::error::Error for HttpError {}

// ── Action errors ─────────────────────────────────────────────────────────────

/// The error type returned by actions and hooks.
#[derive(Debug, Error)]
pub enum Error {
    /// A taxonomy error; answered with its own status and body.
    #[error("{0}")]
    Http(#[from] HttpError),

    /// The route named an action nobody registered. This is a programming or
    /// configuration mistake, never a per-request condition.
    #[error("undefined action `{}`", qualified(.module.as_deref(), .action))]
    UnknownAction {
        action: String,
        module: Option<String>,
    },

    /// An action or hook panicked. `trace` was taken where the panic
    /// started, not where it was caught.
    #[error("panicked: {message}")]
    Panicked { message: String, trace: String },

    /// Anything else that went wrong.
    #[error(transparent)]
    Defect(#[from] anyhow::Error),
}

impl Error {
    /// `true` for errors the dispatcher answers itself.
    pub fn is_taxonomy(&self) -> bool {
        matches!(self, Self::Http(_))
    }

    /// Backtrace text for the error log. Captured regardless of
    /// `RUST_BACKTRACE`.
    pub(crate) fn backtrace(&self) -> String {
        match self {
            Self::Panicked { trace, .. } => trace.clone(),
            Self::Defect(err) if err.backtrace().status() == BacktraceStatus::Captured => {
                err.backtrace().to_string()
            }
            _ => Backtrace::force_capture().to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Defect(e.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Defect(e.into())
    }
}

fn qualified(module: Option<&str>, action: &str) -> String {
    match module {
        Some(module) => format!("{module}::{action}"),
        None => action.to_owned(),
    }
}

// ── Fail-hard ─────────────────────────────────────────────────────────────────

/// A defect that must take the process down (`fail_hard` is set).
///
/// The lifecycle has already logged it at error level. Whoever owns the
/// process decides how to exit; [`Server`](crate::Server) exits with status 1.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct Fatal {
    pub message: String,
    pub backtrace: String,
}

// ── Transport / setup ─────────────────────────────────────────────────────────

/// Infrastructure failures: binding a port, opening a log file, parsing a
/// log filter.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid log level `{level}`: {message}")]
    LogLevel { level: String, message: String },
}
