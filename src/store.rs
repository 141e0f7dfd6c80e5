//! Storage contracts: the trusted context's session store and the shared key-value store
//! behind the login rate limiter.

pub mod file;
pub mod kv;
pub mod memory;
#[cfg(feature = "redis")] pub mod redis;

pub use file::FileSessionStore;
pub use kv::{KvStore, MemoryKvStore};
pub use memory::MemorySessionStore;
#[cfg(feature = "redis")] pub use redis::RedisKvStore;

// self
use crate::{_prelude::*, auth::SessionTokens};

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Secure, server-held store for the trusted context's credential pair.
///
/// Readers must call [`SessionStore::load`] every time they need the credential instead of
/// caching a copy across a suspension point, so a retry never reuses a credential that a
/// concurrent refresh already replaced.
pub trait SessionStore
where
	Self: Send + Sync,
{
	/// Returns the current credential pair, if any.
	fn load(&self) -> StoreFuture<'_, Option<SessionTokens>>;

	/// Replaces the credential pair as a single unit.
	fn save(&self, tokens: SessionTokens) -> StoreFuture<'_, ()>;

	/// Removes the credential pair so subsequent reads observe "no credential".
	fn clear(&self) -> StoreFuture<'_, ()>;
}

/// Error type produced by [`SessionStore`] and [`KvStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
