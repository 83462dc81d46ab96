//! Incoming request type.

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, Uri};
use serde::de::DeserializeOwned;

use crate::error::HttpError;
use crate::router::Params;

/// An incoming request, fully read from the transport.
///
/// Immutable once built. The lifecycle owns it for one call and drops it
/// afterwards.
#[derive(Clone, Debug)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) uri: String,
    pub(crate) path: String,
    pub(crate) query: String,
    pub(crate) headers: HeaderMap,
    pub(crate) remote_addr: String,
    pub(crate) body: Bytes,
}

impl Request {
    /// Starts a request for `method` + `uri`. Transports and tests use this;
    /// handlers only ever read requests.
    pub fn builder(method: Method, uri: &str) -> RequestBuilder {
        RequestBuilder {
            method,
            uri: uri.to_owned(),
            headers: HeaderMap::new(),
            remote_addr: String::new(),
            body: Bytes::new(),
        }
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// The URI exactly as received, query string included.
    pub fn uri(&self) -> &str { &self.uri }

    /// Path component only. Some clients send absolute URIs; scheme, host
    /// and port are stripped.
    pub fn path(&self) -> &str { &self.path }

    /// Raw query string, without the leading `?`.
    pub fn query(&self) -> &str { &self.query }

    /// Peer IP address as reported by the transport. Empty when unknown.
    pub fn remote_addr(&self) -> &str { &self.remote_addr }

    /// Header lookup; `None` when absent or not valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.header(http::header::USER_AGENT.as_str())
    }

    /// Query-string parameters, percent-decoded. Later keys win.
    pub fn query_params(&self) -> Params {
        decode_pairs(self.query.as_bytes())
    }

    /// `application/x-www-form-urlencoded` body parameters.
    pub fn form_params(&self) -> Params {
        decode_pairs(&self.body)
    }

    /// Deserializes a JSON body. Malformed bodies are the client's fault, so
    /// they surface as a `400`.
    pub fn json_body<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        serde_json::from_slice(&self.body).map_err(|e| HttpError::new(400, e.to_string()))
    }
}

fn decode_pairs(raw: &[u8]) -> Params {
    serde_urlencoded::from_bytes::<Vec<(String, String)>>(raw)
        .map(|pairs| pairs.into_iter().collect())
        .unwrap_or_default()
}

// ── RequestBuilder ────────────────────────────────────────────────────────────

/// Fluent builder for [`Request`]. Obtain via [`Request::builder`].
pub struct RequestBuilder {
    method: Method,
    uri: String,
    headers: HeaderMap,
    remote_addr: String,
    body: Bytes,
}

impl RequestBuilder {
    /// Adds a header. Names or values that are not valid HTTP are skipped.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) =
            (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value))
        {
            self.headers.append(name, value);
        }
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = addr.into();
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn build(self) -> Request {
        let (path, query) = split_uri(&self.uri);
        Request {
            method: self.method,
            uri: self.uri,
            path,
            query,
            headers: self.headers,
            remote_addr: self.remote_addr,
            body: self.body,
        }
    }
}

fn split_uri(raw: &str) -> (String, String) {
    match raw.parse::<Uri>() {
        Ok(uri) => {
            let path = match uri.path() {
                "" => "/".to_owned(),
                path => path.to_owned(),
            };
            (path, uri.query().unwrap_or_default().to_owned())
        }
        Err(_) => match raw.split_once('?') {
            Some((path, query)) => (path.to_owned(), query.to_owned()),
            None => (raw.to_owned(), String::new()),
        },
    }
}
