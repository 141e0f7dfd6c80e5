//! Minimal key-value contract over a shared, network-accessible store.
//!
//! The rate limiter only needs four primitives: point reads, set-with-expiry, deletes, and a
//! prefix scan for bulk administrative resets. Every write carries a TTL so the backing store
//! reclaims stale entries on its own.

// self
use crate::{
	_prelude::*,
	store::{StoreError, StoreFuture},
};

/// Shared key-value store used by the distributed rate limiter.
pub trait KvStore
where
	Self: Send + Sync,
{
	/// Fetches the value stored under `key`, ignoring expired entries.
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

	/// Stores `value` under `key` with a time-to-live, replacing any previous value.
	fn set_with_expiry<'a>(
		&'a self,
		key: &'a str,
		value: String,
		ttl: Duration,
	) -> StoreFuture<'a, ()>;

	/// Deletes `key`; deleting a missing key is not an error.
	fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()>;

	/// Lists the live keys that start with `prefix`.
	fn scan<'a>(&'a self, prefix: &'a str) -> StoreFuture<'a, Vec<String>>;
}

#[derive(Clone, Debug)]
struct KvEntry {
	value: String,
	// `None` when the TTL lies beyond the representable range.
	expires_at: Option<OffsetDateTime>,
}
impl KvEntry {
	fn is_live_at(&self, now: OffsetDateTime) -> bool {
		self.expires_at.is_none_or(|expires_at| now < expires_at)
	}
}

type KvMap = Arc<RwLock<HashMap<String, KvEntry>>>;

/// In-process [`KvStore`] with lazy TTL expiry, for single-instance deployments and tests.
#[derive(Clone, Debug, Default)]
pub struct MemoryKvStore(KvMap);
impl MemoryKvStore {
	fn get_now(map: &KvMap, key: &str, now: OffsetDateTime) -> Option<String> {
		{
			let guard = map.read();

			match guard.get(key) {
				Some(entry) if entry.is_live_at(now) => return Some(entry.value.clone()),
				Some(_) => {},
				None => return None,
			}
		}

		let mut guard = map.write();

		if guard.get(key).is_some_and(|entry| !entry.is_live_at(now)) {
			guard.remove(key);
		}

		None
	}

	fn set_now(map: &KvMap, key: &str, value: String, ttl: Duration, now: OffsetDateTime) {
		let ttl = if ttl.is_positive() { ttl } else { Duration::milliseconds(1) };

		map.write().insert(key.to_owned(), KvEntry { value, expires_at: now.checked_add(ttl) });
	}

	fn scan_now(map: &KvMap, prefix: &str, now: OffsetDateTime) -> Vec<String> {
		let mut guard = map.write();

		guard.retain(|_, entry| entry.is_live_at(now));

		let mut keys =
			guard.keys().filter(|key| key.starts_with(prefix)).cloned().collect::<Vec<_>>();

		keys.sort();

		keys
	}

	/// Number of entries currently held, including expired ones not yet reclaimed.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` if the store holds no entries at all.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}
}
impl KvStore for MemoryKvStore {
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		Box::pin(async move { Ok(Self::get_now(&self.0, key, OffsetDateTime::now_utc())) })
	}

	fn set_with_expiry<'a>(
		&'a self,
		key: &'a str,
		value: String,
		ttl: Duration,
	) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			Self::set_now(&self.0, key, value, ttl, OffsetDateTime::now_utc());

			Ok(())
		})
	}

	fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			self.0.write().remove(key);

			Ok(())
		})
	}

	fn scan<'a>(&'a self, prefix: &'a str) -> StoreFuture<'a, Vec<String>> {
		Box::pin(async move { Ok(Self::scan_now(&self.0, prefix, OffsetDateTime::now_utc())) })
	}
}

/// Converts a serde failure into the store's serialization error.
pub(crate) fn serialization_error(err: serde_json::Error) -> StoreError {
	StoreError::Serialization { message: err.to_string() }
}
