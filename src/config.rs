//! Environment-driven configuration for the request client and the login rate limiter.
//!
//! Both structs load through [`figment`] from `BOOTH_`-prefixed environment variables and
//! can also be assembled in code with the `with_*` setters.

// crates.io
use figment::{Figment, providers::Env};
// self
use crate::{_prelude::*, credential::ExecutionContext, error::ConfigError};

/// Connection settings for the downstream API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
	/// Base address used from the trusted (server-side) context.
	pub api_url: Option<Url>,
	/// Base address used from the delegated context, usually the fronting proxy.
	pub public_api_url: Option<Url>,
	/// Path of the refresh endpoint, relative to the context's base address.
	pub refresh_path: String,
	/// Path of the login endpoint, relative to the trusted base address.
	pub login_path: String,
	/// Transport timeout in seconds; `None` leaves the transport's default in place.
	pub timeout_secs: Option<u64>,
	/// Enables cookie propagation on the default transport.
	pub cookie_store: bool,
}
impl ClientConfig {
	/// Environment prefix shared by every client setting.
	pub const ENV_PREFIX: &'static str = "BOOTH_";

	/// Loads settings from `BOOTH_*` environment variables on top of the defaults.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_figment(&Figment::new().merge(Env::prefixed(Self::ENV_PREFIX)))
	}

	/// Extracts settings from an arbitrary figment.
	pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
		Ok(figment.extract()?)
	}

	/// Sets the trusted-context base address.
	pub fn with_api_url(mut self, url: Url) -> Self {
		self.api_url = Some(url);

		self
	}

	/// Sets the delegated-context base address.
	pub fn with_public_api_url(mut self, url: Url) -> Self {
		self.public_api_url = Some(url);

		self
	}

	/// Overrides the refresh endpoint path.
	pub fn with_refresh_path(mut self, path: impl Into<String>) -> Self {
		self.refresh_path = path.into();

		self
	}

	/// Overrides the login endpoint path.
	pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
		self.login_path = path.into();

		self
	}

	/// Sets the transport timeout.
	pub fn with_timeout_secs(mut self, secs: u64) -> Self {
		self.timeout_secs = Some(secs);

		self
	}

	/// Enables or disables cookie propagation.
	pub fn with_cookie_store(mut self, enabled: bool) -> Self {
		self.cookie_store = enabled;

		self
	}

	/// Transport timeout as a standard duration.
	pub fn timeout(&self) -> Option<std::time::Duration> {
		self.timeout_secs.filter(|secs| *secs > 0).map(std::time::Duration::from_secs)
	}

	/// Resolves the base address for `context`.
	///
	/// The trusted context prefers `api_url`, the delegated context prefers
	/// `public_api_url`; each falls back to the other. Having neither is a startup error.
	pub fn base_url(&self, context: ExecutionContext) -> Result<Url, ConfigError> {
		let (preferred, fallback) = match context {
			ExecutionContext::Trusted => (&self.api_url, &self.public_api_url),
			ExecutionContext::Delegated => (&self.public_api_url, &self.api_url),
		};

		preferred
			.as_ref()
			.or(fallback.as_ref())
			.cloned()
			.ok_or(ConfigError::MissingBaseUrl { context: context.as_str() })
	}
}
impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			api_url: None,
			public_api_url: None,
			refresh_path: "/auth/refresh".into(),
			login_path: "/auth/login".into(),
			timeout_secs: None,
			cookie_store: true,
		}
	}
}

/// Login rate-limit policy as loaded from configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
	/// Failed attempts allowed inside one window.
	pub max_attempts: u32,
	/// Length of the attempt window in seconds.
	pub window_secs: u64,
	/// Length of the cool-down applied once the limit is hit, in seconds.
	pub block_secs: u64,
	/// Namespace prepended to client identities (`<namespace>:<ip>`).
	pub namespace: String,
	/// Key prefix used for entries in the shared store.
	pub key_prefix: String,
}
impl RateLimitConfig {
	/// Environment prefix shared by every rate-limit setting.
	pub const ENV_PREFIX: &'static str = "BOOTH_RATE_LIMIT_";

	/// Loads settings from `BOOTH_RATE_LIMIT_*` environment variables on top of the defaults.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_figment(&Figment::new().merge(Env::prefixed(Self::ENV_PREFIX)))
	}

	/// Extracts settings from an arbitrary figment.
	pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
		Ok(figment.extract()?)
	}

	/// Sets the attempt budget.
	pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
		self.max_attempts = max_attempts;

		self
	}

	/// Sets the window length in seconds.
	pub fn with_window_secs(mut self, secs: u64) -> Self {
		self.window_secs = secs;

		self
	}

	/// Sets the block length in seconds.
	pub fn with_block_secs(mut self, secs: u64) -> Self {
		self.block_secs = secs;

		self
	}
}
impl Default for RateLimitConfig {
	fn default() -> Self {
		Self {
			max_attempts: 5,
			window_secs: 15 * 60,
			block_secs: 30 * 60,
			namespace: "login".into(),
			key_prefix: "rate-limit".into(),
		}
	}
}
