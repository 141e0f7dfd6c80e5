//! Redis-backed [`KvStore`] for multi-instance deployments.

// crates.io
use redis::{Client, aio::ConnectionManager};
// self
use crate::{
	_prelude::*,
	store::{KvStore, StoreError, StoreFuture},
};

const SCAN_BATCH: usize = 100;

/// [`KvStore`] over a reconnecting Redis connection manager.
///
/// Writes use `SET key value PX ttl`, so Redis reclaims entries without a sweep job.
#[derive(Clone)]
pub struct RedisKvStore {
	connection: ConnectionManager,
}
impl RedisKvStore {
	/// Connects to the Redis instance at `url` (e.g. `redis://127.0.0.1/`).
	pub async fn connect(url: &str) -> Result<Self, StoreError> {
		let client = Client::open(url).map_err(backend_error)?;
		let connection = ConnectionManager::new(client).await.map_err(backend_error)?;

		Ok(Self { connection })
	}

	/// Wraps an existing connection manager.
	pub fn with_connection(connection: ConnectionManager) -> Self {
		Self { connection }
	}
}
impl Debug for RedisKvStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("RedisKvStore(..)")
	}
}
impl KvStore for RedisKvStore {
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		let mut connection = self.connection.clone();

		Box::pin(async move {
			let value: Option<String> = redis::cmd("GET")
				.arg(key)
				.query_async(&mut connection)
				.await
				.map_err(backend_error)?;

			Ok(value)
		})
	}

	fn set_with_expiry<'a>(
		&'a self,
		key: &'a str,
		value: String,
		ttl: Duration,
	) -> StoreFuture<'a, ()> {
		let mut connection = self.connection.clone();
		let ttl_ms = ttl.whole_milliseconds().clamp(1, i64::MAX as i128) as i64;

		Box::pin(async move {
			let _: () = redis::cmd("SET")
				.arg(key)
				.arg(value)
				.arg("PX")
				.arg(ttl_ms)
				.query_async(&mut connection)
				.await
				.map_err(backend_error)?;

			Ok(())
		})
	}

	fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
		let mut connection = self.connection.clone();

		Box::pin(async move {
			let _: i64 = redis::cmd("DEL")
				.arg(key)
				.query_async(&mut connection)
				.await
				.map_err(backend_error)?;

			Ok(())
		})
	}

	fn scan<'a>(&'a self, prefix: &'a str) -> StoreFuture<'a, Vec<String>> {
		let mut connection = self.connection.clone();
		let pattern = format!("{}*", escape_glob(prefix));

		Box::pin(async move {
			let mut keys = Vec::new();
			let mut cursor = 0_u64;

			loop {
				let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
					.arg(cursor)
					.arg("MATCH")
					.arg(&pattern)
					.arg("COUNT")
					.arg(SCAN_BATCH)
					.query_async(&mut connection)
					.await
					.map_err(backend_error)?;

				keys.extend(batch);

				if next == 0 {
					break;
				}

				cursor = next;
			}

			keys.sort();
			keys.dedup();

			Ok(keys)
		})
	}
}

fn backend_error(err: redis::RedisError) -> StoreError {
	StoreError::Backend { message: err.to_string() }
}

/// Escapes Redis glob metacharacters so `prefix` matches literally.
fn escape_glob(prefix: &str) -> String {
	let mut escaped = String::with_capacity(prefix.len());

	for c in prefix.chars() {
		if matches!(c, '*' | '?' | '[' | ']' | '\\') {
			escaped.push('\\');
		}

		escaped.push(c);
	}

	escaped
}
