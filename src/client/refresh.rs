//! Single-flight coordination of credential refreshes.
//!
//! Every `401` that carries an expiry signal funnels into
//! [`RefreshCoordinator::ensure_refreshed`]. The first caller opens an *episode*, a shared
//! once-cell whose initializer performs the refresh; callers arriving while the episode is
//! open await the same cell instead of starting their own call, so all of them observe one
//! outcome. The resolver persists the new credential before the initializer returns, which
//! makes refresh completion happen-before every waiter's retry. The episode slot is cleared
//! once it resolves so the next independent expiry starts fresh.
//!
//! Inside the initializer the coordinator first compares the refresh generation the caller
//! observed before dispatching with the current one. A caller whose 401 arrived after a later
//! episode already succeeded resolves to success without another network call, even when no
//! credential was attached (the delegated context). It then re-reads the current credential:
//! a value different from the one the caller sent means it was rotated elsewhere.

mod metrics;

pub use metrics::RefreshMetrics;

// std
use std::sync::atomic::{AtomicU64, Ordering};

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	credential::CredentialResolver,
	obs::{self, Operation, OperationSpan, Outcome},
};

struct RefreshEpisode {
	outcome: AsyncOnceCell<bool>,
}
impl RefreshEpisode {
	fn new() -> Self {
		Self { outcome: AsyncOnceCell::new() }
	}
}

/// Collapses concurrent refresh attempts into one call per expiry episode.
#[derive(Default)]
pub struct RefreshCoordinator {
	in_flight: Mutex<Option<Arc<RefreshEpisode>>>,
	generation: AtomicU64,
	metrics: RefreshMetrics,
}
impl RefreshCoordinator {
	/// Ensures the resolver holds a credential newer than `stale`, refreshing at most once per
	/// episode.
	///
	/// `stale` is the credential the caller sent with the rejected request and `observed` the
	/// [`generation`](Self::generation) read before that request was dispatched. Returns `true`
	/// when the caller may retry with [`CredentialResolver::current_credential`].
	pub async fn ensure_refreshed(
		&self,
		resolver: &dyn CredentialResolver,
		stale: Option<&TokenSecret>,
		observed: u64,
	) -> bool {
		let episode = self.join_or_open();
		let refreshed = *episode
			.outcome
			.get_or_init(|| self.run_episode(resolver, stale, observed))
			.await;

		self.close(&episode);

		refreshed
	}

	/// Counters describing how episodes were resolved.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Number of refresh calls that succeeded so far.
	///
	/// Read it before dispatching a request and hand it to
	/// [`ensure_refreshed`](Self::ensure_refreshed) if that request is rejected.
	pub fn generation(&self) -> u64 {
		self.generation.load(Ordering::Acquire)
	}

	/// Returns `true` while an episode is open.
	pub fn is_refreshing(&self) -> bool {
		self.in_flight.lock().is_some()
	}

	fn join_or_open(&self) -> Arc<RefreshEpisode> {
		let mut slot = self.in_flight.lock();

		self.metrics.record_join();

		slot.get_or_insert_with(|| Arc::new(RefreshEpisode::new())).clone()
	}

	fn close(&self, episode: &Arc<RefreshEpisode>) {
		let mut slot = self.in_flight.lock();

		if slot.as_ref().is_some_and(|open| Arc::ptr_eq(open, episode)) {
			*slot = None;
		}
	}

	async fn run_episode(
		&self,
		resolver: &dyn CredentialResolver,
		stale: Option<&TokenSecret>,
		observed: u64,
	) -> bool {
		const OPERATION: Operation = Operation::Refresh;

		if self.generation() != observed {
			self.metrics.record_already_rotated();

			return true;
		}
		if let Ok(current) = resolver.current_credential().await {
			match (current.as_ref(), stale) {
				(Some(current), Some(stale)) if current != stale => {
					self.metrics.record_already_rotated();

					return true;
				},
				// A previous episode failed and cleared the credential.
				(None, Some(_)) => return false,
				_ => {},
			}
		}

		let span = OperationSpan::new(OPERATION, "ensure_refreshed");

		obs::record_outcome(OPERATION, Outcome::Attempt);
		self.metrics.record_refresh_call();

		let refreshed = span.instrument(resolver.refresh()).await;

		if refreshed {
			self.generation.fetch_add(1, Ordering::AcqRel);
			self.metrics.record_success();
			obs::record_outcome(OPERATION, Outcome::Success);
		} else {
			self.metrics.record_failure();
			obs::record_outcome(OPERATION, Outcome::Failure);
		}

		refreshed
	}
}
impl Debug for RefreshCoordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshCoordinator")
			.field("refreshing", &self.is_refreshing())
			.field("generation", &self.generation())
			.field("metrics", &self.metrics)
			.finish()
	}
}
