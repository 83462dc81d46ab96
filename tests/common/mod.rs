//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use halyard::{Config, Method, Request, Response};
use serde_json::Value;
use tracing::Dispatch;
use tracing_subscriber::fmt::MakeWriter;

/// In-memory log sink.
#[derive(Clone, Default)]
pub struct Capture(Arc<Mutex<Vec<u8>>>);

impl Capture {
    /// A logger writing plain, untimed lines into this capture.
    pub fn dispatch(&self) -> Dispatch {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::INFO)
            .finish();
        Dispatch::new(subscriber)
    }

    pub fn lines(&self) -> Vec<String> {
        let bytes = self.0.lock().expect("capture lock");
        String::from_utf8_lossy(&bytes).lines().map(str::to_owned).collect()
    }

    /// Lines logged at `level` (`"INFO"`, `"WARN"`, `"ERROR"`).
    pub fn at(&self, level: &str) -> Vec<String> {
        self.lines().into_iter().filter(|line| line.trim_start().starts_with(level)).collect()
    }
}

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("capture lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Capture {
    type Writer = Capture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Default configuration logging into a fresh capture.
pub fn captured(config: Config) -> (Config, Capture) {
    let capture = Capture::default();
    let config = Config { logger: Some(capture.dispatch()), ..config };
    (config, capture)
}

pub fn get(uri: &str) -> Request {
    Request::builder(Method::GET, uri).remote_addr("127.0.0.1").build()
}

pub fn json(res: &Response) -> Value {
    serde_json::from_slice(res.body()).expect("response body is JSON")
}
