//! Delegated-context resolver for requests proxied through a credential-injecting server.

// crates.io
use http::{HeaderValue, Method, header::ACCEPT};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	credential::{CredentialFuture, CredentialResolver, ExecutionContext},
	http::{HttpRequest, HttpTransport},
};

/// Resolver that never attaches a credential itself.
///
/// The fronting proxy injects the credential server-side, so [`current_credential`] is always
/// empty. Refreshing POSTs an empty body to the proxy's refresh endpoint and relies on the
/// transport to carry session cookies; any non-2xx response or transport failure counts as a
/// failed refresh.
///
/// [`current_credential`]: CredentialResolver::current_credential
pub struct DelegatedCredentials<T>
where
	T: ?Sized + HttpTransport,
{
	transport: Arc<T>,
	refresh_endpoint: Url,
}
impl<T> DelegatedCredentials<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a resolver that refreshes through `refresh_endpoint`.
	pub fn new(transport: impl Into<Arc<T>>, refresh_endpoint: Url) -> Self {
		Self { transport: transport.into(), refresh_endpoint }
	}

	/// Endpoint called on refresh.
	pub fn refresh_endpoint(&self) -> &Url {
		&self.refresh_endpoint
	}

	async fn call_refresh_endpoint(&self) -> Result<bool> {
		let mut request = HttpRequest::new(Vec::new());

		*request.method_mut() = Method::POST;
		*request.uri_mut() =
			self.refresh_endpoint.as_str().parse().map_err(crate::error::ConfigError::from)?;
		request.headers_mut().insert(ACCEPT, HeaderValue::from_static("application/json"));

		let response = self.transport.execute(request).await?;

		Ok(response.status().is_success())
	}
}
impl<T> CredentialResolver for DelegatedCredentials<T>
where
	T: ?Sized + HttpTransport,
{
	fn context(&self) -> ExecutionContext {
		ExecutionContext::Delegated
	}

	fn current_credential(&self) -> CredentialFuture<'_, Result<Option<TokenSecret>>> {
		Box::pin(async { Ok(None) })
	}

	fn refresh(&self) -> CredentialFuture<'_, bool> {
		Box::pin(async move {
			match self.call_refresh_endpoint().await {
				Ok(refreshed) => refreshed,
				Err(err) => {
					#[cfg(feature = "tracing")]
					tracing::warn!(error = %err, "refresh endpoint unreachable");
					#[cfg(not(feature = "tracing"))]
					let _ = err;

					false
				},
			}
		})
	}
}
impl<T> Debug for DelegatedCredentials<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("DelegatedCredentials")
			.field("refresh_endpoint", &self.refresh_endpoint.as_str())
			.finish()
	}
}
