// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing how expiry episodes were resolved.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	refresh_calls: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
	joined: AtomicU64,
	already_rotated: AtomicU64,
}
impl RefreshMetrics {
	/// Number of times the resolver's refresh operation was actually invoked.
	pub fn refresh_calls(&self) -> u64 {
		self.refresh_calls.load(Ordering::Relaxed)
	}

	/// Number of refresh calls that produced a new credential.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Number of refresh calls that failed.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	/// Number of callers that entered the coordinator during an expiry episode.
	pub fn joined(&self) -> u64 {
		self.joined.load(Ordering::Relaxed)
	}

	/// Number of episodes resolved without a call because the credential had already rotated.
	pub fn already_rotated(&self) -> u64 {
		self.already_rotated.load(Ordering::Relaxed)
	}

	pub(crate) fn record_refresh_call(&self) {
		self.refresh_calls.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failure.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_join(&self) {
		self.joined.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_already_rotated(&self) {
		self.already_rotated.fetch_add(1, Ordering::Relaxed);
	}
}
