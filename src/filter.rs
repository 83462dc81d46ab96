//! Access filtering, applied to every request before routing.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::config::AccessPolicy;
use crate::error::HttpError;
use crate::request::Request;

/// Remote addresses the `local-only` policy admits.
pub const LOOPBACK_ADDRS: [&str; 4] = ["localhost", "127.0.0.1", "0.0.0.0", "::1"];

/// `JSON/1.1.0 Compatible (en-US) Halyard::Client(0.3.1)`
static CLIENT_SIGNATURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"JSON/\d+\.\d+(\.\d+)? Compatible \(en-US\) Halyard::Client\(\d+\.\d+\.\d+\)")
        .expect("client signature pattern compiles")
});

/// Admits or rejects `req` under `policy`.
///
/// Rejections are always [`HttpError::Forbidden`]. An unrecognised policy
/// admits the request and logs a warning.
pub fn check(req: &Request, policy: &AccessPolicy) -> Result<(), HttpError> {
    match policy {
        AccessPolicy::All => Ok(()),
        AccessPolicy::RestrictedClient => {
            let admitted = req.user_agent().is_some_and(|ua| CLIENT_SIGNATURE.is_match(ua));
            admitted.then_some(()).ok_or_else(HttpError::forbidden)
        }
        AccessPolicy::LocalOnly => {
            let admitted = LOOPBACK_ADDRS.contains(&req.remote_addr());
            admitted.then_some(()).ok_or_else(HttpError::forbidden)
        }
        AccessPolicy::Unrecognized(raw) => {
            warn!(
                "Unrecognized allow_from configuration value ({raw}); use all, restricted-client, or local-only."
            );
            Ok(())
        }
    }
}
