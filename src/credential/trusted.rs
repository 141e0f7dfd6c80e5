//! Trusted-context resolver backed by a server-held session store.

// crates.io
use http::{
	HeaderValue, Method,
	header::{ACCEPT, CONTENT_TYPE},
};
// self
use crate::{
	_prelude::*,
	auth::{SessionTokens, TokenSecret},
	client::{self, error_body},
	credential::{CredentialFuture, CredentialResolver, ExecutionContext},
	http::{HttpRequest, HttpTransport},
	store::SessionStore,
};

/// Boxed future returned by [`TokenRefresher::refresh_tokens`].
pub type RefreshFuture<'a> = Pin<Box<dyn Future<Output = Result<SessionTokens>> + 'a + Send>>;

/// Exchanges a refresh secret for a new credential pair.
pub trait TokenRefresher
where
	Self: Send + Sync,
{
	/// Calls the downstream refresh operation with `refresh_token`.
	///
	/// The returned pair may omit a new refresh secret; the resolver then keeps the old one.
	fn refresh_tokens<'a>(&'a self, refresh_token: &'a TokenSecret) -> RefreshFuture<'a>;
}

#[derive(Serialize)]
struct RefreshRequestBody<'a> {
	refresh_token: &'a str,
}

/// [`TokenRefresher`] that POSTs the refresh secret as JSON to the downstream API.
pub struct HttpTokenRefresher<T>
where
	T: ?Sized + HttpTransport,
{
	transport: Arc<T>,
	endpoint: Url,
}
impl<T> HttpTokenRefresher<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a refresher that calls `endpoint` through `transport`.
	pub fn new(transport: impl Into<Arc<T>>, endpoint: Url) -> Self {
		Self { transport: transport.into(), endpoint }
	}

	/// Endpoint the refresher calls.
	pub fn endpoint(&self) -> &Url {
		&self.endpoint
	}

	fn build_request(&self, refresh_token: &TokenSecret) -> Result<HttpRequest> {
		let body = serde_json::to_vec(&RefreshRequestBody { refresh_token: refresh_token.expose() })
			.map_err(crate::error::ConfigError::from)?;
		let mut request = HttpRequest::new(body);

		*request.method_mut() = Method::POST;
		*request.uri_mut() =
			self.endpoint.as_str().parse().map_err(crate::error::ConfigError::from)?;
		request.headers_mut().insert(ACCEPT, HeaderValue::from_static("application/json"));
		request.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

		Ok(request)
	}
}
impl<T> TokenRefresher for HttpTokenRefresher<T>
where
	T: ?Sized + HttpTransport,
{
	fn refresh_tokens<'a>(&'a self, refresh_token: &'a TokenSecret) -> RefreshFuture<'a> {
		Box::pin(async move {
			let request = self.build_request(refresh_token)?;
			let response = self.transport.execute(request).await?;
			let status = response.status();

			if !status.is_success() {
				return Err(Error::Request {
					status: status.as_u16(),
					message: error_body::extract_message(status, response.body()),
				});
			}

			client::decode_json::<SessionTokens>(status, response.body())
		})
	}
}
impl<T> Debug for HttpTokenRefresher<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HttpTokenRefresher").field("endpoint", &self.endpoint.as_str()).finish()
	}
}

/// Resolver for server-side code that holds the credential pair itself.
#[derive(Clone)]
pub struct TrustedCredentials {
	store: Arc<dyn SessionStore>,
	refresher: Arc<dyn TokenRefresher>,
}
impl TrustedCredentials {
	/// Creates a resolver over `store` that renews credentials through `refresher`.
	pub fn new(store: Arc<dyn SessionStore>, refresher: Arc<dyn TokenRefresher>) -> Self {
		Self { store, refresher }
	}

	/// Session store backing this resolver.
	pub fn store(&self) -> &Arc<dyn SessionStore> {
		&self.store
	}

	async fn refresh_session(&self) -> Result<bool> {
		let Some(current) = self.store.load().await? else {
			return Ok(false);
		};
		let Some(refresh_token) = current.refresh_token else {
			self.store.clear().await?;

			return Ok(false);
		};

		match self.refresher.refresh_tokens(&refresh_token).await {
			Ok(renewed) => {
				self.store.save(renewed.or_refresh_token(Some(refresh_token))).await?;

				Ok(true)
			},
			Err(err) => {
				#[cfg(feature = "tracing")]
				tracing::warn!(error = %err, "session refresh rejected; clearing credentials");
				#[cfg(not(feature = "tracing"))]
				let _ = err;

				self.store.clear().await?;

				Ok(false)
			},
		}
	}
}
impl CredentialResolver for TrustedCredentials {
	fn context(&self) -> ExecutionContext {
		ExecutionContext::Trusted
	}

	fn current_credential(&self) -> CredentialFuture<'_, Result<Option<TokenSecret>>> {
		Box::pin(async move { Ok(self.store.load().await?.map(|tokens| tokens.access_token)) })
	}

	fn refresh(&self) -> CredentialFuture<'_, bool> {
		Box::pin(async move {
			match self.refresh_session().await {
				Ok(refreshed) => refreshed,
				Err(err) => {
					#[cfg(feature = "tracing")]
					tracing::warn!(error = %err, "session store failed during refresh");
					#[cfg(not(feature = "tracing"))]
					let _ = err;

					false
				},
			}
		})
	}
}
impl Debug for TrustedCredentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("TrustedCredentials(..)")
	}
}
