//! Process-local [`SessionStore`] for single-instance deployments and tests.

// self
use crate::{
	_prelude::*,
	auth::SessionTokens,
	store::{SessionStore, StoreFuture},
};

/// Thread-safe session store that keeps the credential pair in-process.
#[derive(Clone, Debug, Default)]
pub struct MemorySessionStore(Arc<RwLock<Option<SessionTokens>>>);
impl MemorySessionStore {
	/// Creates a store pre-populated with `tokens`.
	pub fn with_tokens(tokens: SessionTokens) -> Self {
		Self(Arc::new(RwLock::new(Some(tokens))))
	}
}
impl SessionStore for MemorySessionStore {
	fn load(&self) -> StoreFuture<'_, Option<SessionTokens>> {
		let tokens = self.0.read().clone();

		Box::pin(async move { Ok(tokens) })
	}

	fn save(&self, tokens: SessionTokens) -> StoreFuture<'_, ()> {
		let slot = self.0.clone();

		Box::pin(async move {
			*slot.write() = Some(tokens);

			Ok(())
		})
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		let slot = self.0.clone();

		Box::pin(async move {
			slot.write().take();

			Ok(())
		})
	}
}
