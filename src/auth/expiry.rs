//! Detection of credential-expiry signals on `401 Unauthorized` responses.
//!
//! The downstream service announces an expired credential through either:
//!
//! - a `WWW-Authenticate` challenge that carries both the `invalid_token` error code and an
//!   expiry description (e.g. `Bearer error="invalid_token", error_description="The access
//!   token expired"`), or
//! - the non-standard boolean header `X-Token-Expired: true`.
//!
//! A `401` without either signal is a hard authentication failure and must not trigger a
//! refresh.

// crates.io
use http::{HeaderMap, header::WWW_AUTHENTICATE};

/// Non-standard boolean header announcing an expired credential.
pub const TOKEN_EXPIRED_HEADER: &str = "x-token-expired";

const INVALID_TOKEN_MARKER: &str = "invalid_token";
const EXPIRED_MARKER: &str = "expired";

/// Returns `true` if the response headers announce an expired credential.
pub fn is_expiry_signal(headers: &HeaderMap) -> bool {
	challenge_signals_expiry(headers) || flag_signals_expiry(headers)
}

fn challenge_signals_expiry(headers: &HeaderMap) -> bool {
	headers.get_all(WWW_AUTHENTICATE).iter().filter_map(|value| value.to_str().ok()).any(|raw| {
		let raw = raw.to_ascii_lowercase();

		raw.contains(INVALID_TOKEN_MARKER) && raw.contains(EXPIRED_MARKER)
	})
}

fn flag_signals_expiry(headers: &HeaderMap) -> bool {
	headers
		.get(TOKEN_EXPIRED_HEADER)
		.and_then(|value| value.to_str().ok())
		.is_some_and(|raw| raw.trim().eq_ignore_ascii_case("true"))
}
