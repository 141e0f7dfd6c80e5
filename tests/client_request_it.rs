#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
use serde_json::{Value, json};
// self
use booth_auth::{
	_preludet::*,
	auth::{SessionTokens, TokenSecret},
	client::{ApiResponse, ReqwestApiClient, RequestOptions},
	config::ClientConfig,
	error::ConfigError,
	store::{MemorySessionStore, SessionStore},
};

fn seeded(access: &str) -> Option<SessionTokens> {
	Some(SessionTokens::new(access, Some(TokenSecret::new("refresh-1"))))
}

#[tokio::test]
async fn success_decodes_body_and_sends_bearer() {
	let server = MockServer::start_async().await;
	let (client, _) = build_trusted_test_client(&server.base_url(), seeded("access-1"));
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/booths/42").header("authorization", "Bearer access-1");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"id\":42,\"name\":\"Retro Booth\"}");
		})
		.await;
	let response = client.get::<Value>("/booths/42").await.expect("Request should succeed.");

	mock.assert_async().await;

	assert_eq!(response.into_body(), Some(json!({ "id": 42, "name": "Retro Booth" })));
}

#[tokio::test]
async fn no_content_is_a_sentinel_not_an_error() {
	let server = MockServer::start_async().await;
	let (client, _) = build_trusted_test_client(&server.base_url(), seeded("access-1"));

	server
		.mock_async(|when, then| {
			when.method(DELETE).path("/booths/42");
			then.status(204);
		})
		.await;

	let response = client.delete::<Value>("/booths/42").await.expect("Delete should succeed.");

	assert!(response.is_no_content());
	assert!(matches!(response, ApiResponse::NoContent));
}

#[tokio::test]
async fn error_body_message_is_extracted() {
	let server = MockServer::start_async().await;
	let (client, _) = build_trusted_test_client(&server.base_url(), seeded("access-1"));

	server
		.mock_async(|when, then| {
			when.method(POST).path("/booths");
			then.status(422)
				.header("content-type", "application/json")
				.body("{\"detail\":[{\"msg\":\"Value error, name too short\"}]}");
		})
		.await;

	let err = client
		.post::<Value, _>("/booths", &json!({ "name": "x" }))
		.await
		.expect_err("Validation failure must surface.");

	assert_eq!(err.status(), 422);
	assert_eq!(err.to_string(), "name too short");
}

#[tokio::test]
async fn unauthorized_without_expiry_signal_does_not_refresh() {
	let server = MockServer::start_async().await;
	let (client, store) = build_trusted_test_client(&server.base_url(), seeded("access-1"));
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"access-2\"}");
		})
		.await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/me");
			then.status(401)
				.header("content-type", "application/json")
				.body("{\"detail\":\"Not authenticated\"}");
		})
		.await;

	let err = client.get::<Value>("/me").await.expect_err("Plain 401 must surface.");

	refresh.assert_calls_async(0).await;

	assert!(!err.is_session_expired());
	assert_eq!(err.status(), 401);
	assert_eq!(err.to_string(), "Not authenticated");
	assert!(store.load().await.expect("Store load should succeed.").is_some());
	assert_eq!(client.refresh_metrics().refresh_calls(), 0);
}

#[tokio::test]
async fn caller_headers_and_methods_are_forwarded() {
	let server = MockServer::start_async().await;
	let (client, _) = build_trusted_test_client(&server.base_url(), seeded("access-1"));
	let mock = server
		.mock_async(|when, then| {
			when.method(PATCH)
				.path("/templates/7")
				.header("x-request-id", "req-1")
				.header("content-type", "application/json")
				.header("authorization", "Bearer access-1");
			then.status(200).header("content-type", "application/json").body("{\"ok\":true}");
		})
		.await;
	let options = RequestOptions::new(http::Method::PATCH)
		.with_header(
			http::HeaderName::from_static("x-request-id"),
			http::HeaderValue::from_static("req-1"),
		)
		.with_json(&json!({ "title": "Summer" }))
		.expect("JSON body should serialize.");
	let response =
		client.request::<Value>("/templates/7", options).await.expect("Patch should succeed.");

	mock.assert_async().await;

	assert_eq!(response.into_body(), Some(json!({ "ok": true })));
}

#[tokio::test]
async fn transport_failure_reports_status_zero() {
	let (client, _) = build_trusted_test_client("http://127.0.0.1:1", seeded("access-1"));
	let err = client.get::<Value>("/me").await.expect_err("Closed port must fail.");

	assert!(err.is_network());
	assert_eq!(err.status(), 0);
}

#[test]
fn missing_base_address_is_a_startup_error() {
	let err = ReqwestApiClient::new_trusted(
		&ClientConfig::default(),
		Arc::new(MemorySessionStore::default()),
	)
	.expect_err("A client without base address must not build.");

	assert!(matches!(err, ConfigError::MissingBaseUrl { context: "trusted" }));
}
