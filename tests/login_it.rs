#![cfg(feature = "reqwest")]

// crates.io
use http::{HeaderMap, HeaderValue};
use httpmock::prelude::*;
use serde_json::{Value, json};
// self
use booth_auth::{
	_preludet::*,
	auth::SessionTokens,
	login::LoginCredentials,
	store::{KvStore, SessionStore},
};

const IDENTITY: &str = "login:203.0.113.9";

fn wrong_password() -> LoginCredentials {
	LoginCredentials::new("vendor@example.com", "wrong")
}

#[tokio::test]
async fn sixth_wrong_password_is_blocked_before_downstream() {
	let server = MockServer::start_async().await;
	let (flow, sessions, _) = build_test_login_flow(&server.base_url());
	let login = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/login");
			then.status(401)
				.header("content-type", "application/json")
				.body("{\"detail\":\"Incorrect email or password\"}");
		})
		.await;

	for _ in 0..5 {
		let err = flow
			.login(IDENTITY, &wrong_password())
			.await
			.expect_err("Wrong password must be rejected.");

		assert_eq!(err.status(), 401);
		assert_eq!(err.to_string(), "Incorrect email or password");
	}

	let blocked = flow
		.login(IDENTITY, &wrong_password())
		.await
		.expect_err("Sixth attempt must be blocked.");

	login.assert_calls_async(5).await;

	match blocked {
		Error::RateLimited { retry_after_minutes, reset_at } => {
			assert!((29..=30).contains(&retry_after_minutes));
			assert!(reset_at > OffsetDateTime::now_utc() + Duration::minutes(29));
		},
		other => panic!("Expected a rate-limit rejection, got {other:?}."),
	}

	assert!(sessions.load().await.expect("Store load should succeed.").is_none());
}

#[tokio::test]
async fn success_clears_attempts_and_stores_session() {
	let server = MockServer::start_async().await;
	let (flow, sessions, kv) = build_test_login_flow(&server.base_url());
	let rejected = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/login").json_body(json!({
				"email": "vendor@example.com",
				"password": "wrong",
			}));
			then.status(401).body("{\"detail\":\"Incorrect email or password\"}");
		})
		.await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/login").json_body(json!({
				"email": "vendor@example.com",
				"password": "correct",
			}));
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"access-1\",\"refresh_token\":\"refresh-1\"}");
		})
		.await;

	for _ in 0..3 {
		let _ = flow.login(IDENTITY, &wrong_password()).await;
	}

	rejected.assert_calls_async(3).await;

	assert_eq!(
		flow.limiter().check_rate_limit(IDENTITY).await.expect("Check should succeed.").remaining,
		2
	);

	let tokens = flow
		.login(IDENTITY, &LoginCredentials::new("vendor@example.com", "correct"))
		.await
		.expect("Correct password should log in.");

	assert_eq!(tokens.access_token.expose(), "access-1");
	assert!(kv.scan("rate-limit:").await.expect("Scan should succeed.").is_empty());

	let stored: SessionTokens =
		sessions.load().await.expect("Store load should succeed.").expect("Session stored.");

	assert_eq!(stored, tokens);
}

#[tokio::test]
async fn logged_in_client_uses_stored_session_until_logout() {
	let server = MockServer::start_async().await;
	let (flow, sessions, _) = build_test_login_flow(&server.base_url());

	server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/login");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"access-1\",\"refresh_token\":\"refresh-1\"}");
		})
		.await;

	let me = server
		.mock_async(|when, then| {
			when.method(GET).path("/me").header("authorization", "Bearer access-1");
			then.status(200).header("content-type", "application/json").body("{\"id\":7}");
		})
		.await;

	flow.login(IDENTITY, &LoginCredentials::new("vendor@example.com", "correct"))
		.await
		.expect("Login should succeed.");

	let profile = flow.client().get::<Value>("/me").await.expect("Profile should load.");

	me.assert_async().await;

	assert_eq!(profile.into_body(), Some(json!({ "id": 7 })));

	flow.logout().await.expect("Logout should succeed.");

	assert!(sessions.load().await.expect("Store load should succeed.").is_none());
}

#[tokio::test]
async fn server_errors_do_not_count_as_failed_attempts() {
	let server = MockServer::start_async().await;
	let (flow, _, kv) = build_test_login_flow(&server.base_url());

	server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/login");
			then.status(503).body("Service Unavailable");
		})
		.await;

	let err = flow
		.login(IDENTITY, &wrong_password())
		.await
		.expect_err("Upstream outage must surface.");

	assert_eq!(err.status(), 503);
	assert!(kv.is_empty());
}

#[tokio::test]
async fn identity_is_derived_from_proxy_headers() {
	let server = MockServer::start_async().await;
	let (flow, _, kv) = build_test_login_flow(&server.base_url());
	let mut headers = HeaderMap::new();

	headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
	server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/login");
			then.status(403).body("{\"message\":\"Account locked\"}");
		})
		.await;

	let err = flow
		.login_from_headers(&headers, &wrong_password())
		.await
		.expect_err("Forbidden must surface.");

	assert_eq!(err.to_string(), "Account locked");
	assert_eq!(
		kv.scan("rate-limit:").await.expect("Scan should succeed."),
		vec!["rate-limit:login:203.0.113.9".to_owned()]
	);
}
