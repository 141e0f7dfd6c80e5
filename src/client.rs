//! Authenticated request client.
//!
//! [`ApiClient::request`] resolves the context's base address, attaches the credential
//! produced by the configured [`CredentialResolver`], and inspects the response:
//!
//! - `204` resolves to [`ApiResponse::NoContent`];
//! - other 2xx statuses decode the JSON body into the caller's type;
//! - a `401` carrying an expiry signal runs the single-flight refresh and retries exactly
//!   once; the retry's result is final, and a failed refresh yields
//!   [`Error::SessionExpired`];
//! - a `401` without an expiry signal, and every other non-2xx status, fails with
//!   [`Error::Request`] carrying the message parsed from the body.
//!
//! Transport failures surface immediately as [`Error::Transport`] (status sentinel `0`) and
//! are never retried here.

pub mod error_body;
pub mod refresh;

pub use refresh::{RefreshCoordinator, RefreshMetrics};

// crates.io
use http::{
	HeaderMap, HeaderName, HeaderValue, Method, StatusCode,
	header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
};
// self
use crate::{
	_prelude::*,
	auth::{TokenSecret, expiry},
	config::ClientConfig,
	credential::{
		CredentialResolver, DelegatedCredentials, ExecutionContext, HttpTokenRefresher,
		TrustedCredentials,
	},
	error::{ConfigError, DecodeError},
	http::{HttpRequest, HttpResponse, HttpTransport},
	obs::{self, Operation, OperationSpan, Outcome},
	store::SessionStore,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport.
pub type ReqwestApiClient = ApiClient<ReqwestTransport>;

/// Result of a successful request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApiResponse<T> {
	/// The service answered `204 No Content`.
	NoContent,
	/// The service answered with a decoded body.
	Body(T),
}
impl<T> ApiResponse<T> {
	/// Returns the decoded body, or `None` for [`ApiResponse::NoContent`].
	pub fn into_body(self) -> Option<T> {
		match self {
			Self::NoContent => None,
			Self::Body(body) => Some(body),
		}
	}

	/// Returns `true` for [`ApiResponse::NoContent`].
	pub fn is_no_content(&self) -> bool {
		matches!(self, Self::NoContent)
	}
}

/// Per-request method, headers, and body.
///
/// Caller headers override the client's defaults (`accept`, and `content-type` when a body is
/// present) but never the credential header, which the client sets last.
#[derive(Clone, Debug)]
pub struct RequestOptions {
	/// HTTP method.
	pub method: Method,
	/// Caller-supplied headers.
	pub headers: HeaderMap,
	/// Raw body, sent unmodified.
	pub body: Option<Vec<u8>>,
}
impl RequestOptions {
	/// Creates options for `method` with no headers or body.
	pub fn new(method: Method) -> Self {
		Self { method, headers: HeaderMap::new(), body: None }
	}

	/// Adds or replaces a header.
	pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Merges `headers`, replacing values for names already present.
	pub fn with_headers(mut self, headers: HeaderMap) -> Self {
		self.headers.extend(headers);

		self
	}

	/// Sets a raw body.
	pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = Some(body.into());

		self
	}

	/// Serializes `body` as JSON.
	pub fn with_json<B>(self, body: &B) -> Result<Self, ConfigError>
	where
		B: ?Sized + Serialize,
	{
		Ok(self.with_body(serde_json::to_vec(body)?))
	}
}
impl Default for RequestOptions {
	fn default() -> Self {
		Self::new(Method::GET)
	}
}

/// Authenticated client for the downstream API.
///
/// The credential strategy is fixed at construction; see [`ApiClient::trusted`] and
/// [`ApiClient::delegated`]. Clones share the transport, resolver, and refresh coordinator,
/// so concurrent expiries across clones still collapse into one refresh.
pub struct ApiClient<T>
where
	T: ?Sized + HttpTransport,
{
	transport: Arc<T>,
	credentials: Arc<dyn CredentialResolver>,
	refresh: Arc<RefreshCoordinator>,
	base_url: Url,
}
impl<T> ApiClient<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a client for an arbitrary resolver.
	///
	/// Fails with [`ConfigError::MissingBaseUrl`] when no base address exists for the
	/// resolver's context.
	pub fn with_transport(
		config: &ClientConfig,
		credentials: Arc<dyn CredentialResolver>,
		transport: impl Into<Arc<T>>,
	) -> Result<Self, ConfigError> {
		let base_url = config.base_url(credentials.context())?;

		Ok(Self {
			transport: transport.into(),
			credentials,
			refresh: Default::default(),
			base_url,
		})
	}

	/// Creates a trusted-context client that reads credentials from `store` and refreshes
	/// them by calling the downstream refresh operation directly.
	pub fn trusted(
		config: &ClientConfig,
		store: Arc<dyn SessionStore>,
		transport: impl Into<Arc<T>>,
	) -> Result<Self, ConfigError> {
		let transport = transport.into();
		let base_url = config.base_url(ExecutionContext::Trusted)?;
		let refresher = HttpTokenRefresher::<T>::new(
			transport.clone(),
			endpoint(&base_url, &config.refresh_path)?,
		);
		let credentials = TrustedCredentials::new(store, Arc::new(refresher));

		Self::with_transport(config, Arc::new(credentials), transport)
	}

	/// Creates a delegated-context client that sends no credential itself and refreshes
	/// through the proxy's refresh endpoint.
	pub fn delegated(
		config: &ClientConfig,
		transport: impl Into<Arc<T>>,
	) -> Result<Self, ConfigError> {
		let transport = transport.into();
		let base_url = config.base_url(ExecutionContext::Delegated)?;
		let credentials = DelegatedCredentials::<T>::new(
			transport.clone(),
			endpoint(&base_url, &config.refresh_path)?,
		);

		Self::with_transport(config, Arc::new(credentials), transport)
	}

	/// Base address requests are resolved against.
	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	/// Execution context of the configured resolver.
	pub fn context(&self) -> ExecutionContext {
		self.credentials.context()
	}

	/// Credential resolver chosen at construction.
	pub fn credentials(&self) -> &Arc<dyn CredentialResolver> {
		&self.credentials
	}

	/// Counters describing refresh episodes handled by this client (and its clones).
	pub fn refresh_metrics(&self) -> &RefreshMetrics {
		self.refresh.metrics()
	}

	/// Issues a request and decodes a JSON response, running the refresh protocol on expiry.
	pub async fn request<R>(&self, path: &str, options: RequestOptions) -> Result<ApiResponse<R>>
	where
		R: DeserializeOwned,
	{
		const OPERATION: Operation = Operation::Request;

		let span = OperationSpan::new(OPERATION, "request");

		obs::record_outcome(OPERATION, Outcome::Attempt);

		let result = span.instrument(self.request_with_refresh(path, &options)).await;

		obs::record_outcome(OPERATION, Outcome::of(&result));

		result
	}

	/// `GET path`.
	pub async fn get<R>(&self, path: &str) -> Result<ApiResponse<R>>
	where
		R: DeserializeOwned,
	{
		self.request(path, RequestOptions::new(Method::GET)).await
	}

	/// `POST path` with a JSON body.
	pub async fn post<R, B>(&self, path: &str, body: &B) -> Result<ApiResponse<R>>
	where
		R: DeserializeOwned,
		B: ?Sized + Serialize,
	{
		self.request(path, RequestOptions::new(Method::POST).with_json(body)?).await
	}

	/// `PUT path` with a JSON body.
	pub async fn put<R, B>(&self, path: &str, body: &B) -> Result<ApiResponse<R>>
	where
		R: DeserializeOwned,
		B: ?Sized + Serialize,
	{
		self.request(path, RequestOptions::new(Method::PUT).with_json(body)?).await
	}

	/// `PATCH path` with a JSON body.
	pub async fn patch<R, B>(&self, path: &str, body: &B) -> Result<ApiResponse<R>>
	where
		R: DeserializeOwned,
		B: ?Sized + Serialize,
	{
		self.request(path, RequestOptions::new(Method::PATCH).with_json(body)?).await
	}

	/// `DELETE path`.
	pub async fn delete<R>(&self, path: &str) -> Result<ApiResponse<R>>
	where
		R: DeserializeOwned,
	{
		self.request(path, RequestOptions::new(Method::DELETE)).await
	}

	async fn request_with_refresh<R>(
		&self,
		path: &str,
		options: &RequestOptions,
	) -> Result<ApiResponse<R>>
	where
		R: DeserializeOwned,
	{
		let url = endpoint(&self.base_url, path)?;
		let generation = self.refresh.generation();
		let credential = self.credentials.current_credential().await?;
		let response = self.dispatch(&url, options, credential.as_ref()).await?;

		if response.status() != StatusCode::UNAUTHORIZED
			|| !expiry::is_expiry_signal(response.headers())
		{
			return into_api_response(response);
		}
		if self
			.refresh
			.ensure_refreshed(self.credentials.as_ref(), credential.as_ref(), generation)
			.await
		{
			let credential = self.credentials.current_credential().await?;
			let retried = self.dispatch(&url, options, credential.as_ref()).await?;

			return into_api_response(retried);
		}

		Err(Error::SessionExpired { detail: error_body::parse_message(response.body()) })
	}

	async fn dispatch(
		&self,
		url: &Url,
		options: &RequestOptions,
		credential: Option<&TokenSecret>,
	) -> Result<HttpResponse> {
		let request = build_request(url, options, credential)?;

		Ok(self.transport.execute(request).await?)
	}
}
#[cfg(feature = "reqwest")]
impl ApiClient<ReqwestTransport> {
	/// Trusted-context client over a reqwest transport built from `config`.
	pub fn new_trusted(
		config: &ClientConfig,
		store: Arc<dyn SessionStore>,
	) -> Result<Self, ConfigError> {
		Self::trusted(config, store, ReqwestTransport::from_config(config)?)
	}

	/// Delegated-context client over a reqwest transport built from `config`.
	pub fn new_delegated(config: &ClientConfig) -> Result<Self, ConfigError> {
		Self::delegated(config, ReqwestTransport::from_config(config)?)
	}
}
impl<T> Clone for ApiClient<T>
where
	T: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			transport: self.transport.clone(),
			credentials: self.credentials.clone(),
			refresh: self.refresh.clone(),
			base_url: self.base_url.clone(),
		}
	}
}
impl<T> Debug for ApiClient<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiClient")
			.field("base_url", &self.base_url.as_str())
			.field("context", &self.context())
			.field("refresh", &self.refresh)
			.finish()
	}
}

/// Joins `path` onto `base`, keeping any path prefix the base already carries.
pub fn endpoint(base: &Url, path: &str) -> Result<Url, ConfigError> {
	let joined =
		format!("{}/{}", base.as_str().trim_end_matches('/'), path.trim_start_matches('/'));

	Url::parse(&joined).map_err(|source| ConfigError::InvalidPath { path: path.into(), source })
}

/// Decodes a JSON body, reporting the failing path on mismatch.
pub(crate) fn decode_json<R>(status: StatusCode, body: &[u8]) -> Result<R>
where
	R: DeserializeOwned,
{
	let mut deserializer = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| DecodeError { source, status: status.as_u16() }.into())
}

fn build_request(
	url: &Url,
	options: &RequestOptions,
	credential: Option<&TokenSecret>,
) -> Result<HttpRequest, ConfigError> {
	let mut request = HttpRequest::new(options.body.clone().unwrap_or_default());

	*request.method_mut() = options.method.clone();
	*request.uri_mut() = url.as_str().parse()?;

	let headers = request.headers_mut();

	headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

	if options.body.is_some() {
		headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
	}

	headers.extend(options.headers.clone());

	if let Some(credential) = credential {
		let mut value = HeaderValue::from_str(&credential.bearer())?;

		value.set_sensitive(true);
		headers.insert(AUTHORIZATION, value);
	}

	Ok(request)
}

fn into_api_response<R>(response: HttpResponse) -> Result<ApiResponse<R>>
where
	R: DeserializeOwned,
{
	let status = response.status();

	if status == StatusCode::NO_CONTENT {
		return Ok(ApiResponse::NoContent);
	}
	if !status.is_success() {
		return Err(Error::Request {
			status: status.as_u16(),
			message: error_body::extract_message(status, response.body()),
		});
	}

	decode_json(status, response.body()).map(ApiResponse::Body)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(value: &str) -> Url {
		Url::parse(value).expect("Fixture URL should parse.")
	}

	#[test]
	fn endpoint_keeps_base_prefix() {
		let base = url("https://booth.example.com/api/proxy/");

		assert_eq!(
			endpoint(&base, "/booths/42").expect("Join should succeed.").as_str(),
			"https://booth.example.com/api/proxy/booths/42",
		);
		assert_eq!(
			endpoint(&url("http://api.internal:8000"), "templates?page=2")
				.expect("Join should succeed.")
				.as_str(),
			"http://api.internal:8000/templates?page=2",
		);
	}

	#[test]
	fn caller_headers_override_defaults_but_not_credential() {
		let options = RequestOptions::new(Method::POST)
			.with_body(b"name=booth".to_vec())
			.with_header(
				CONTENT_TYPE,
				HeaderValue::from_static("application/x-www-form-urlencoded"),
			)
			.with_header(AUTHORIZATION, HeaderValue::from_static("Bearer caller"));
		let request = build_request(
			&url("http://api.internal:8000/booths"),
			&options,
			Some(&TokenSecret::new("session")),
		)
		.expect("Request should build.");

		assert_eq!(request.method(), Method::POST);
		assert_eq!(request.body(), b"name=booth");
		assert_eq!(
			request.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
			Some("application/x-www-form-urlencoded"),
		);
		assert_eq!(
			request.headers().get(AUTHORIZATION).and_then(|v| v.to_str().ok()),
			Some("Bearer session"),
		);
		assert!(request.headers().get(AUTHORIZATION).is_some_and(HeaderValue::is_sensitive));
	}

	#[test]
	fn missing_credential_leaves_caller_authorization_alone() {
		let options = RequestOptions::default()
			.with_header(AUTHORIZATION, HeaderValue::from_static("Bearer caller"));
		let request = build_request(&url("http://api.internal:8000/me"), &options, None)
			.expect("Request should build.");

		assert_eq!(
			request.headers().get(AUTHORIZATION).and_then(|v| v.to_str().ok()),
			Some("Bearer caller"),
		);
		assert!(request.headers().get(CONTENT_TYPE).is_none());
	}

	#[test]
	fn no_content_is_distinct_from_empty_object() {
		let mut no_content = HttpResponse::new(Vec::new());

		*no_content.status_mut() = StatusCode::NO_CONTENT;

		let decoded = into_api_response::<serde_json::Value>(no_content)
			.expect("204 should never be an error.");

		assert!(decoded.is_no_content());

		let empty_object = into_api_response::<serde_json::Value>(HttpResponse::new(b"{}".to_vec()))
			.expect("Empty object should decode.");

		assert_eq!(empty_object, ApiResponse::Body(serde_json::json!({})));
	}

	#[test]
	fn decode_errors_report_status_and_path() {
		#[derive(Debug, Deserialize)]
		#[allow(dead_code)]
		struct Booth {
			id: u64,
		}

		let err = into_api_response::<Booth>(HttpResponse::new(br#"{"id":"x"}"#.to_vec()))
			.expect_err("Mismatched bodies should fail to decode.");

		match err {
			Error::Decode(DecodeError { source, status }) => {
				assert_eq!(status, 200);
				assert_eq!(source.path().to_string(), "id");
			},
			other => panic!("Unexpected error: {other:?}"),
		}
	}
}
