//! Outgoing response accumulator and the standard `{status, body}` reply.
//!
//! Actions never build a [`Response`] themselves. They return a JSON value
//! (usually a [`Reply`]) and may tweak status or headers through
//! [`Context::response_mut`](crate::Context::response_mut); the lifecycle
//! serialises the value into the body and finalises the response once.

use bytes::Bytes;
use http_body_util::Full;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Media type of every body halyard writes.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Version of the JSON wire format announced in the `User-Agent` header.
pub const JSON_FORMAT_VERSION: &str = "1.0";

/// Identifying `User-Agent` value stamped on every response.
pub fn server_signature() -> String {
    format!(
        "JSON/{JSON_FORMAT_VERSION} Compatible (en-US) Halyard::Server/{}",
        env!("CARGO_PKG_VERSION")
    )
}

// ── Reply ─────────────────────────────────────────────────────────────────────

/// The conventional result shape: `{"status": 200, "body": ...}`.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Reply {
    pub status: u16,
    pub body: Value,
}

impl Reply {
    /// `{status: 200, body}`.
    pub fn ok(body: impl Into<Value>) -> Self {
        Self { status: 200, body: body.into() }
    }

    /// The body every unexpected defect is answered with.
    pub fn internal_error() -> Self {
        Self { status: 500, body: Value::from("Internal Server Error") }
    }
}

impl From<Reply> for Value {
    fn from(reply: Reply) -> Self {
        json!({ "status": reply.status, "body": reply.body })
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// Status, headers and body of the response being built for one call.
#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    pub(crate) status: u16,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Vec<u8>,
}

impl Response {
    /// Empty `200`.
    pub fn new() -> Self {
        Self { status: 200, headers: Vec::new(), body: Vec::new() }
    }

    pub fn status(&self) -> u16 { self.status }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    pub fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Sets a header, replacing any earlier value of the same name.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_owned(), value.into()));
    }

    pub(crate) fn write_json(&mut self, value: &Value) -> serde_json::Result<()> {
        self.body = serde_json::to_vec(value)?;
        Ok(())
    }

    /// Converts into the transport's response type. Statuses `http` cannot
    /// represent become `500`; invalid header pairs are dropped.
    pub fn into_inner(self) -> http::Response<Full<Bytes>> {
        let mut builder = http::Response::builder().status(
            http::StatusCode::from_u16(self.status)
                .unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR),
        );
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                http::HeaderName::from_bytes(name.as_bytes()),
                http::HeaderValue::from_str(value),
            ) {
                builder = builder.header(name, value);
            }
        }
        builder
            .body(Full::new(Bytes::from(self.body)))
            .unwrap_or_else(|_| http::Response::new(Full::new(Bytes::new())))
    }
}

impl Default for Response {
    fn default() -> Self { Self::new() }
}
