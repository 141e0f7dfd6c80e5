// std
use std::sync::Arc;
// crates.io
use time::{Duration, OffsetDateTime};
// self
use booth_auth::{
	config::RateLimitConfig,
	rate_limit::{ClientIdentity, LoginRateLimiter, RateLimitPolicy},
	store::{KvStore, MemoryKvStore},
};

const IDENTITY: &str = "login:203.0.113.9";

fn limiter(store: &MemoryKvStore) -> LoginRateLimiter {
	LoginRateLimiter::new(Arc::new(store.clone()), &RateLimitConfig::default())
		.expect("Default limiter config should be valid.")
}

#[tokio::test]
async fn five_failures_block_and_remaining_saturates() {
	let store = MemoryKvStore::default();
	let limiter = limiter(&store);

	for _ in 0..5 {
		limiter.record_failed_attempt(IDENTITY).await.expect("Recording should succeed.");
	}

	let blocked = limiter.check_rate_limit(IDENTITY).await.expect("Check should succeed.");

	assert!(!blocked.allowed);
	assert_eq!(blocked.remaining, 0);

	let sixth = limiter.record_failed_attempt(IDENTITY).await.expect("Recording should succeed.");

	assert!(!sixth.allowed);
	assert_eq!(sixth.remaining, 0);
}

#[tokio::test]
async fn escalation_is_measured_from_triggering_attempt() {
	let store = MemoryKvStore::default();
	let limiter = limiter(&store);
	let start = OffsetDateTime::now_utc();

	for minute in 0..4 {
		limiter
			.record_failed_attempt_at(IDENTITY, start + Duration::minutes(minute))
			.await
			.expect("Recording should succeed.");
	}

	let fifth_at = start + Duration::minutes(10);
	let status = limiter
		.record_failed_attempt_at(IDENTITY, fifth_at)
		.await
		.expect("Recording should succeed.");

	assert!(!status.allowed);
	assert_eq!(status.reset_time, fifth_at + Duration::minutes(30));
	assert_eq!(status.retry_after_minutes(fifth_at), 30);
	assert_eq!(
		status.retry_message(fifth_at),
		"Too many login attempts. Please try again in 30 minutes."
	);
}

#[tokio::test]
async fn clear_restores_full_allowance() {
	let store = MemoryKvStore::default();
	let limiter = limiter(&store);

	for _ in 0..5 {
		limiter.record_failed_attempt(IDENTITY).await.expect("Recording should succeed.");
	}

	limiter.clear_rate_limit(IDENTITY).await.expect("Clearing should succeed.");

	let status = limiter.check_rate_limit(IDENTITY).await.expect("Check should succeed.");

	assert!(status.allowed);
	assert_eq!(status.remaining, 5);
	assert!(store.is_empty());
}

#[tokio::test]
async fn identities_are_isolated_and_clear_all_only_touches_limiter_keys() {
	let store = MemoryKvStore::default();
	let limiter = limiter(&store);
	let other = limiter.identity_for(&ClientIdentity::from_ip([198, 51, 100, 4].into()));

	store
		.set_with_expiry("session:abc", "{}".into(), Duration::minutes(5))
		.await
		.expect("Seeding should succeed.");
	limiter.record_failed_attempt(IDENTITY).await.expect("Recording should succeed.");
	limiter.record_failed_attempt(&other).await.expect("Recording should succeed.");

	let first = limiter.check_rate_limit(IDENTITY).await.expect("Check should succeed.");

	assert_eq!(first.remaining, 4);

	let cleared = limiter.clear_all_rate_limits().await.expect("Bulk clear should succeed.");

	assert_eq!(cleared, 2);
	assert_eq!(store.scan("").await.expect("Scan should succeed."), vec!["session:abc".to_owned()]);
}

#[tokio::test]
async fn entries_expire_with_their_window() {
	let store = MemoryKvStore::default();
	let policy = RateLimitPolicy::new(3, Duration::milliseconds(50), Duration::milliseconds(80))
		.expect("Short policy should be valid.");
	let limiter = LoginRateLimiter::with_policy(Arc::new(store.clone()), policy);

	limiter.record_failed_attempt(IDENTITY).await.expect("Recording should succeed.");

	let key = limiter.key_for(IDENTITY);

	assert!(store.get(&key).await.expect("Get should succeed.").is_some());

	tokio::time::sleep(std::time::Duration::from_millis(120)).await;

	assert!(store.get(&key).await.expect("Get should succeed.").is_none());

	let status = limiter.check_rate_limit(IDENTITY).await.expect("Check should succeed.");

	assert_eq!(status.remaining, 3);
}

#[tokio::test]
async fn escalated_entry_lives_for_the_block_duration() {
	let store = MemoryKvStore::default();
	let policy = RateLimitPolicy::new(2, Duration::milliseconds(50), Duration::milliseconds(200))
		.expect("Short policy should be valid.");
	let limiter = LoginRateLimiter::with_policy(Arc::new(store.clone()), policy);
	let key = limiter.key_for(IDENTITY);

	limiter.record_failed_attempt(IDENTITY).await.expect("Recording should succeed.");

	let blocked = limiter.record_failed_attempt(IDENTITY).await.expect("Recording should succeed.");

	assert!(!blocked.allowed);

	tokio::time::sleep(std::time::Duration::from_millis(100)).await;

	assert!(store.get(&key).await.expect("Get should succeed.").is_some());
	assert!(!limiter.check_rate_limit(IDENTITY).await.expect("Check should succeed.").allowed);

	tokio::time::sleep(std::time::Duration::from_millis(150)).await;

	assert!(store.get(&key).await.expect("Get should succeed.").is_none());
	assert!(limiter.check_rate_limit(IDENTITY).await.expect("Check should succeed.").allowed);
}

#[tokio::test]
async fn configured_key_prefix_is_honored() {
	let store = MemoryKvStore::default();
	let config = RateLimitConfig { key_prefix: "rl".into(), ..Default::default() };
	let limiter = LoginRateLimiter::new(Arc::new(store.clone()), &config)
		.expect("Custom prefix config should be valid.");

	limiter.record_failed_attempt(IDENTITY).await.expect("Recording should succeed.");

	assert_eq!(
		store.scan("rl:").await.expect("Scan should succeed."),
		vec!["rl:login:203.0.113.9".to_owned()]
	);
}
