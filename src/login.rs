//! Login flow gated by the distributed rate limiter.
//!
//! The limiter is consulted before the downstream login call; a blocked identity never
//! reaches the service. Rejected credentials (`401`/`403`) count as failed attempts, a
//! successful login clears the identity's entry and stores the issued session.

// crates.io
use http::HeaderMap;
// self
use crate::{
	_prelude::*,
	auth::{SessionTokens, TokenSecret},
	client::{ApiClient, ApiResponse},
	config::ClientConfig,
	error::ConfigError,
	http::HttpTransport,
	obs::{self, Operation, OperationSpan, Outcome},
	rate_limit::{ClientIdentity, LoginRateLimiter},
	store::SessionStore,
};

/// Credentials submitted to the downstream login operation.
#[derive(Clone, Serialize)]
pub struct LoginCredentials {
	/// Account e-mail address.
	pub email: String,
	/// Account password.
	pub password: TokenSecret,
}
impl LoginCredentials {
	/// Creates a credential set.
	pub fn new(email: impl Into<String>, password: impl Into<TokenSecret>) -> Self {
		Self { email: email.into(), password: password.into() }
	}
}
impl Debug for LoginCredentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LoginCredentials")
			.field("email", &self.email)
			.field("password", &"<redacted>")
			.finish()
	}
}

/// Trusted-context login: rate limiter, downstream call, and session persistence.
pub struct LoginFlow<T>
where
	T: ?Sized + HttpTransport,
{
	client: ApiClient<T>,
	limiter: LoginRateLimiter,
	sessions: Arc<dyn SessionStore>,
	login_path: String,
}
impl<T> LoginFlow<T>
where
	T: ?Sized + HttpTransport,
{
	/// Wires an existing client, limiter, and session store together.
	pub fn new(
		client: ApiClient<T>,
		limiter: LoginRateLimiter,
		sessions: Arc<dyn SessionStore>,
		login_path: impl Into<String>,
	) -> Self {
		Self { client, limiter, sessions, login_path: login_path.into() }
	}

	/// Builds a trusted client over `transport` that shares `sessions` with this flow.
	pub fn from_config(
		config: &ClientConfig,
		sessions: Arc<dyn SessionStore>,
		limiter: LoginRateLimiter,
		transport: impl Into<Arc<T>>,
	) -> Result<Self, ConfigError> {
		let client = ApiClient::trusted(config, sessions.clone(), transport)?;

		Ok(Self::new(client, limiter, sessions, config.login_path.clone()))
	}

	/// Client used for the login call; it reads the session this flow stores.
	pub fn client(&self) -> &ApiClient<T> {
		&self.client
	}

	/// Limiter guarding the flow.
	pub fn limiter(&self) -> &LoginRateLimiter {
		&self.limiter
	}

	/// Logs in on behalf of the client described by `headers`.
	pub async fn login_from_headers(
		&self,
		headers: &HeaderMap,
		credentials: &LoginCredentials,
	) -> Result<SessionTokens> {
		let identity = self.limiter.identity_for(&ClientIdentity::from_headers(headers));

		self.login(&identity, credentials).await
	}

	/// Logs in as `identity` (`<namespace>:<ip>`).
	///
	/// Fails with [`Error::RateLimited`] without contacting the service while the identity is
	/// blocked. Rejected credentials surface as [`Error::Request`] after the attempt has been
	/// recorded.
	pub async fn login(
		&self,
		identity: &str,
		credentials: &LoginCredentials,
	) -> Result<SessionTokens> {
		const OPERATION: Operation = Operation::Login;

		let span = OperationSpan::new(OPERATION, "login");

		obs::record_outcome(OPERATION, Outcome::Attempt);

		let result = span.instrument(self.login_inner(identity, credentials)).await;

		obs::record_outcome(OPERATION, Outcome::of(&result));

		result
	}

	/// Forgets the stored session.
	pub async fn logout(&self) -> Result<()> {
		self.sessions.clear().await?;

		Ok(())
	}

	async fn login_inner(
		&self,
		identity: &str,
		credentials: &LoginCredentials,
	) -> Result<SessionTokens> {
		let now = OffsetDateTime::now_utc();
		let status = self.limiter.check_at(identity, now).await?;

		if !status.allowed {
			#[cfg(feature = "tracing")]
			tracing::warn!(
				identity,
				reset_at = %status.reset_time,
				"login blocked by rate limiter"
			);

			return Err(status.to_error(now));
		}

		match self.client.post::<SessionTokens, _>(&self.login_path, credentials).await {
			Ok(ApiResponse::Body(tokens)) => {
				self.limiter.clear_rate_limit(identity).await?;
				self.sessions.save(tokens.clone()).await?;

				Ok(tokens)
			},
			Ok(ApiResponse::NoContent) => Err(Error::Request {
				status: 204,
				message: "Login response did not include a session.".into(),
			}),
			Err(err @ Error::Request { status: 401 | 403, .. }) => {
				self.limiter.record_failed_attempt(identity).await?;

				Err(err)
			},
			Err(err) => Err(err),
		}
	}
}
impl<T> Debug for LoginFlow<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LoginFlow")
			.field("client", &self.client)
			.field("limiter", &self.limiter)
			.field("login_path", &self.login_path)
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn credentials_serialize_plainly_but_debug_redacts() {
		let credentials = LoginCredentials::new("vendor@example.com", "hunter2");
		let json = serde_json::to_value(&credentials).expect("Credentials should serialize.");

		assert_eq!(
			json,
			serde_json::json!({ "email": "vendor@example.com", "password": "hunter2" })
		);
		assert!(!format!("{credentials:?}").contains("hunter2"));
	}
}
