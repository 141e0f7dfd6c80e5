//! Distributed login rate limiter layered on a shared [`KvStore`].
//!
//! Window and escalation decisions live in [`policy`] as pure functions of `(now, entry)`.
//! This module only reads the stored entry, applies the policy, and writes the next entry
//! back with a TTL equal to its remaining lifetime, so the backing store reclaims it without
//! a sweep.
//!
//! Writes are read-modify-write. Two instances racing on the same identity can undercount
//! by one inside a window; the limiter accepts that in exchange for needing nothing beyond
//! plain get/set from the store.

pub mod identity;
pub mod policy;

pub use identity::*;
pub use policy::*;

// self
use crate::{
	_prelude::*,
	config::RateLimitConfig,
	error::ConfigError,
	obs::{self, Operation, OperationSpan, Outcome},
	store::{KvStore, StoreError, kv},
};

/// Stored representation: `{"count": n, "resetTime": <unix millis>}`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredEntry {
	count: u32,
	reset_time: i64,
}
impl From<RateLimitEntry> for StoredEntry {
	fn from(entry: RateLimitEntry) -> Self {
		let millis = entry.reset_time.unix_timestamp_nanos() / 1_000_000;

		Self { count: entry.count, reset_time: i64::try_from(millis).unwrap_or(i64::MAX) }
	}
}
impl TryFrom<StoredEntry> for RateLimitEntry {
	type Error = time::error::ComponentRange;

	fn try_from(stored: StoredEntry) -> Result<Self, Self::Error> {
		let reset_time =
			OffsetDateTime::from_unix_timestamp_nanos(i128::from(stored.reset_time) * 1_000_000)?;

		Ok(Self { count: stored.count, reset_time })
	}
}

/// Brute-force guard for login-style operations, keyed by client identity.
///
/// Identities are free-form strings, conventionally `<namespace>:<ip>` as produced by
/// [`LoginRateLimiter::identity_for`]. Entries are stored under `<key_prefix>:<identity>`.
#[derive(Clone)]
pub struct LoginRateLimiter {
	store: Arc<dyn KvStore>,
	policy: RateLimitPolicy,
	namespace: String,
	key_prefix: String,
}
impl LoginRateLimiter {
	/// Builds a limiter from configuration, validating the policy parameters.
	pub fn new(store: Arc<dyn KvStore>, config: &RateLimitConfig) -> Result<Self, ConfigError> {
		Ok(Self {
			store,
			policy: RateLimitPolicy::from_config(config)?,
			namespace: config.namespace.clone(),
			key_prefix: config.key_prefix.clone(),
		})
	}

	/// Builds a limiter with an explicit policy and the default namespace and key prefix.
	pub fn with_policy(store: Arc<dyn KvStore>, policy: RateLimitPolicy) -> Self {
		let defaults = RateLimitConfig::default();

		Self { store, policy, namespace: defaults.namespace, key_prefix: defaults.key_prefix }
	}

	/// Active policy.
	pub fn policy(&self) -> &RateLimitPolicy {
		&self.policy
	}

	/// Identity string for `client` under this limiter's namespace.
	pub fn identity_for(&self, client: &ClientIdentity) -> String {
		client.scoped(&self.namespace)
	}

	/// Store key holding the entry for `identity`.
	pub fn key_for(&self, identity: &str) -> String {
		format!("{}:{identity}", self.key_prefix)
	}

	/// Reports whether `identity` may attempt another login. Never writes.
	pub async fn check_rate_limit(&self, identity: &str) -> Result<RateLimitStatus> {
		self.check_at(identity, OffsetDateTime::now_utc()).await
	}

	/// [`LoginRateLimiter::check_rate_limit`] evaluated at an explicit instant.
	pub async fn check_at(&self, identity: &str, now: OffsetDateTime) -> Result<RateLimitStatus> {
		let span = OperationSpan::new(Operation::RateLimit, "check_rate_limit");
		let result = span
			.instrument(async {
				let entry = self.load(&self.key_for(identity)).await?;

				Ok::<_, Error>(self.policy.check(now, entry.as_ref()))
			})
			.await;

		obs::record_outcome(Operation::RateLimit, Outcome::of(&result));

		result
	}

	/// Records a failed attempt and returns the resulting decision.
	pub async fn record_failed_attempt(&self, identity: &str) -> Result<RateLimitStatus> {
		self.record_failed_attempt_at(identity, OffsetDateTime::now_utc()).await
	}

	/// [`LoginRateLimiter::record_failed_attempt`] evaluated at an explicit instant.
	pub async fn record_failed_attempt_at(
		&self,
		identity: &str,
		now: OffsetDateTime,
	) -> Result<RateLimitStatus> {
		let span = OperationSpan::new(Operation::RateLimit, "record_failed_attempt");
		let result = span
			.instrument(async {
				let key = self.key_for(identity);
				let previous = self.load(&key).await?;
				let next = self.policy.record_failure(now, previous);

				self.persist(&key, next, now).await?;

				Ok::<_, Error>(self.policy.check(now, Some(&next)))
			})
			.await;

		obs::record_outcome(Operation::RateLimit, Outcome::of(&result));

		result
	}

	/// Removes the entry for `identity`, restoring the full allowance.
	pub async fn clear_rate_limit(&self, identity: &str) -> Result<()> {
		self.store.delete(&self.key_for(identity)).await?;

		Ok(())
	}

	/// Removes every entry under this limiter's key prefix and returns how many were deleted.
	///
	/// Intended for administrative resets and tests.
	pub async fn clear_all_rate_limits(&self) -> Result<usize> {
		let prefix = format!("{}:", self.key_prefix);
		let keys = self.store.scan(&prefix).await?;

		for key in &keys {
			self.store.delete(key).await?;
		}

		#[cfg(feature = "tracing")]
		tracing::info!(cleared = keys.len(), prefix = %prefix, "cleared all rate-limit entries");

		Ok(keys.len())
	}

	async fn load(&self, key: &str) -> Result<Option<RateLimitEntry>, StoreError> {
		let Some(raw) = self.store.get(key).await? else {
			return Ok(None);
		};

		match decode_entry(&raw) {
			Some(entry) => Ok(Some(entry)),
			None => {
				#[cfg(feature = "tracing")]
				tracing::warn!(key, "discarding unreadable rate-limit entry");

				Ok(None)
			},
		}
	}

	async fn persist(
		&self,
		key: &str,
		entry: RateLimitEntry,
		now: OffsetDateTime,
	) -> Result<(), StoreError> {
		let value =
			serde_json::to_string(&StoredEntry::from(entry)).map_err(kv::serialization_error)?;
		let ttl = entry.remaining_ttl(now).max(Duration::milliseconds(1));

		self.store.set_with_expiry(key, value, ttl).await
	}
}
impl Debug for LoginRateLimiter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LoginRateLimiter")
			.field("policy", &self.policy)
			.field("namespace", &self.namespace)
			.field("key_prefix", &self.key_prefix)
			.finish_non_exhaustive()
	}
}

fn decode_entry(raw: &str) -> Option<RateLimitEntry> {
	let stored = serde_json::from_str::<StoredEntry>(raw).ok()?;

	RateLimitEntry::try_from(stored).ok()
}
