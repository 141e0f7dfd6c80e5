//! Authenticated API client with single-flight session refresh, plus a distributed login
//! rate limiter backed by a shared key-value store.
//!
//! - [`client::ApiClient`] attaches the credential of its execution context, detects expiry
//!   signals on `401` responses, collapses concurrent refreshes into one call, and retries
//!   exactly once.
//! - [`rate_limit::LoginRateLimiter`] counts failed logins per client identity inside a
//!   window and escalates to a block, storing every entry with a self-expiring TTL.
//! - [`login::LoginFlow`] wires both together for the trusted context.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod config;
pub mod credential;
pub mod error;
pub mod http;
pub mod login;
pub mod obs;
pub mod rate_limit;
pub mod store;
#[cfg(feature = "reqwest")]
#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports and helpers for unit and integration tests.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::SessionTokens,
		client::ReqwestApiClient,
		config::{ClientConfig, RateLimitConfig},
		http::ReqwestTransport,
		login::LoginFlow,
		rate_limit::LoginRateLimiter,
		store::{MemoryKvStore, MemorySessionStore},
	};

	/// Login flow type alias used by reqwest-backed integration tests.
	pub type ReqwestTestLoginFlow = LoginFlow<ReqwestTransport>;

	/// Client configuration pointing both contexts at `base_url` with a short timeout.
	pub fn test_client_config(base_url: &str) -> ClientConfig {
		let url = Url::parse(base_url).expect("Mock server URL should parse.");

		ClientConfig::default()
			.with_api_url(url.clone())
			.with_public_api_url(url)
			.with_timeout_secs(5)
	}

	/// Builds a trusted-context client over an in-memory session store seeded with `tokens`.
	pub fn build_trusted_test_client(
		base_url: &str,
		tokens: Option<SessionTokens>,
	) -> (ReqwestApiClient, MemorySessionStore) {
		let store = tokens.map(MemorySessionStore::with_tokens).unwrap_or_default();
		let client = ReqwestApiClient::new_trusted(
			&test_client_config(base_url),
			Arc::new(store.clone()),
		)
		.expect("Trusted test client should build.");

		(client, store)
	}

	/// Builds a delegated-context client whose refresh goes through the mock proxy.
	pub fn build_delegated_test_client(base_url: &str) -> ReqwestApiClient {
		ReqwestApiClient::new_delegated(&test_client_config(base_url))
			.expect("Delegated test client should build.")
	}

	/// Builds a login flow with default limiter policy over in-memory stores.
	pub fn build_test_login_flow(
		base_url: &str,
	) -> (ReqwestTestLoginFlow, MemorySessionStore, MemoryKvStore) {
		let config = test_client_config(base_url);
		let sessions = MemorySessionStore::default();
		let kv = MemoryKvStore::default();
		let limiter =
			LoginRateLimiter::new(Arc::new(kv.clone()), &RateLimitConfig::default())
				.expect("Default limiter config should be valid.");
		let transport =
			ReqwestTransport::from_config(&config).expect("Test transport should build.");
		let flow = LoginFlow::from_config(&config, Arc::new(sessions.clone()), limiter, transport)
			.expect("Test login flow should build.");

		(flow, sessions, kv)
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::OnceCell as AsyncOnceCell;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize, de::DeserializeOwned};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
