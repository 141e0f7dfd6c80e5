//! Crate-level error types shared by the request client, credential resolvers, stores, and
//! the login rate limiter.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Fixed message surfaced when a session could not be refreshed.
pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please log in again.";

/// Canonical error exposed by public APIs.
///
/// Every failure path of the client and the limiter ends up here; callers branch on the
/// variant (or on [`Error::status`] / [`Error::is_session_expired`]) instead of parsing
/// messages.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure (session store or key-value store).
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem; fatal and never retried.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// A successful response carried a body that could not be decoded.
	#[error(transparent)]
	Decode(#[from] DecodeError),

	/// The downstream service rejected the request with a non-2xx status.
	#[error("{message}")]
	Request {
		/// HTTP status code returned by the downstream service.
		status: u16,
		/// Message extracted from the error body, or the status text.
		message: String,
	},
	/// The credential expired and could not be refreshed; the user must sign in again.
	#[error("{}", SESSION_EXPIRED_MESSAGE)]
	SessionExpired {
		/// Message parsed from the rejected response body, when present.
		detail: Option<String>,
	},
	/// The login limiter blocked the attempt before it reached the downstream service.
	#[error(
		"Too many login attempts. Please try again in {retry_after_minutes} minute{}.",
		plural_suffix(.retry_after_minutes)
	)]
	RateLimited {
		/// Instant at which the block lifts.
		reset_at: OffsetDateTime,
		/// Whole minutes (rounded up) until the block lifts.
		retry_after_minutes: i64,
	},
}
impl Error {
	/// HTTP status associated with the failure.
	///
	/// Failures that never produced an HTTP response (network, configuration, storage) report
	/// the sentinel `0`.
	pub fn status(&self) -> u16 {
		match self {
			Self::Request { status, .. } => *status,
			Self::Decode(err) => err.status,
			Self::SessionExpired { .. } => 401,
			Self::RateLimited { .. } => 429,
			Self::Storage(_) | Self::Config(_) | Self::Transport(_) => 0,
		}
	}

	/// Returns `true` when the caller must route the user back to re-authentication.
	pub fn is_session_expired(&self) -> bool {
		matches!(self, Self::SessionExpired { .. })
	}

	/// Returns `true` when the transport could not complete the exchange.
	pub fn is_network(&self) -> bool {
		matches!(self, Self::Transport(_))
	}
}

fn plural_suffix(count: &i64) -> &'static str {
	if *count == 1 { "" } else { "s" }
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Configuration sources could not be read or extracted.
	#[error("Configuration could not be loaded.")]
	Load {
		/// Underlying figment failure.
		#[source]
		source: Box<figment::Error>,
	},
	/// Neither the trusted nor the public API base address is configured.
	#[error("No API base address is configured for the {context} context.")]
	MissingBaseUrl {
		/// Execution context label.
		context: &'static str,
	},
	/// A request path could not be joined onto the base address.
	#[error("Request path `{path}` does not form a valid URL.")]
	InvalidPath {
		/// Offending path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A request URL could not be converted into an HTTP URI.
	#[error("Request URL is not a valid HTTP URI.")]
	InvalidUri(#[from] http::uri::InvalidUri),
	/// A header value (usually the bearer credential) contains invalid bytes.
	#[error("Header value is invalid.")]
	InvalidHeader(#[from] http::header::InvalidHeaderValue),
	/// A request body could not be serialized.
	#[error("Request body could not be serialized.")]
	Body(#[from] serde_json::Error),
	/// Rate-limit parameters are out of range.
	#[error("Rate limit policy is invalid: {reason}.")]
	InvalidRateLimit {
		/// Which parameter was rejected.
		reason: &'static str,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<figment::Error> for ConfigError {
	fn from(e: figment::Error) -> Self {
		Self::Load { source: Box::new(e) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO, timeouts).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the API.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// A 2xx response body did not match the expected shape.
#[derive(Debug, ThisError)]
#[error("API returned a body that could not be decoded (status {status}).")]
pub struct DecodeError {
	/// Structured parsing failure, including the JSON path.
	#[source]
	pub source: serde_path_to_error::Error<serde_json::Error>,
	/// HTTP status of the decoded response.
	pub status: u16,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn status_sentinels_follow_error_class() {
		let network = Error::from(TransportError::Io(std::io::Error::other("reset")));

		assert_eq!(network.status(), 0);
		assert!(network.is_network());
		assert!(!network.is_session_expired());

		let expired = Error::SessionExpired { detail: Some("Token expired".into()) };

		assert_eq!(expired.status(), 401);
		assert!(expired.is_session_expired());
		assert_eq!(expired.to_string(), SESSION_EXPIRED_MESSAGE);

		let request = Error::Request { status: 401, message: "Incorrect password".into() };

		assert_eq!(request.status(), 401);
		assert!(!request.is_session_expired());
		assert_eq!(request.to_string(), "Incorrect password");
	}

	#[test]
	fn rate_limited_message_pluralizes_minutes() {
		let now = OffsetDateTime::UNIX_EPOCH;
		let one = Error::RateLimited { reset_at: now, retry_after_minutes: 1 };
		let many = Error::RateLimited { reset_at: now, retry_after_minutes: 30 };

		assert_eq!(one.to_string(), "Too many login attempts. Please try again in 1 minute.");
		assert_eq!(many.to_string(), "Too many login attempts. Please try again in 30 minutes.");
		assert_eq!(many.status(), 429);
	}

	#[test]
	fn store_error_keeps_its_source() {
		let err: Error =
			crate::store::StoreError::Backend { message: "redis unreachable".into() }.into();

		assert!(matches!(err, Error::Storage(_)));
		assert!(err.to_string().contains("redis unreachable"));
		assert!(std::error::Error::source(&err).is_some());
	}
}
