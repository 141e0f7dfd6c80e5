//! Pure window/escalation logic for the login rate limiter.
//!
//! Every decision is a function of `(now, entry)`; the store-backed limiter only reads the
//! entry, calls into this module, and writes the next entry back with a TTL.

// self
use crate::{_prelude::*, config::RateLimitConfig, error::ConfigError};

/// Attempt counter for one client identity.
///
/// `count` only grows inside a window; an elapsed window is replaced by a fresh entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitEntry {
	/// Failed attempts recorded in the current window.
	pub count: u32,
	/// Instant the window (or block) ends.
	pub reset_time: OffsetDateTime,
}
impl RateLimitEntry {
	/// Returns `true` once the window or block has elapsed.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		now >= self.reset_time
	}

	/// Time left until the entry lapses, never negative.
	pub fn remaining_ttl(&self, now: OffsetDateTime) -> Duration {
		let ttl = self.reset_time - now;

		if ttl.is_positive() { ttl } else { Duration::ZERO }
	}
}

/// Decision returned to the login flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitStatus {
	/// Whether another attempt may proceed.
	pub allowed: bool,
	/// Attempts left in the current window.
	pub remaining: u32,
	/// Instant the window or block ends.
	pub reset_time: OffsetDateTime,
}
impl RateLimitStatus {
	/// Whole minutes until `reset_time`, rounded up and at least one while blocked.
	pub fn retry_after_minutes(&self, now: OffsetDateTime) -> i64 {
		let seconds = (self.reset_time - now).whole_seconds().max(0);
		let minutes = (seconds + 59) / 60;

		if self.allowed { minutes } else { minutes.max(1) }
	}

	/// Error surfaced to a caller this status rejects.
	pub fn to_error(&self, now: OffsetDateTime) -> Error {
		Error::RateLimited {
			reset_at: self.reset_time,
			retry_after_minutes: self.retry_after_minutes(now),
		}
	}

	/// Human-readable retry hint for blocked callers.
	pub fn retry_message(&self, now: OffsetDateTime) -> String {
		self.to_error(now).to_string()
	}
}

/// Attempt budget, window, and cool-down applied to failed logins.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitPolicy {
	max_attempts: u32,
	window: Duration,
	block_duration: Duration,
}
impl RateLimitPolicy {
	/// Longest window or block a policy accepts.
	pub const MAX_DURATION: Duration = Duration::days(365);

	/// Builds a policy, rejecting zero budgets and durations outside `(0, MAX_DURATION]`.
	pub fn new(
		max_attempts: u32,
		window: Duration,
		block_duration: Duration,
	) -> Result<Self, ConfigError> {
		if max_attempts == 0 {
			return Err(ConfigError::InvalidRateLimit { reason: "max_attempts must be positive" });
		}
		if !window.is_positive() {
			return Err(ConfigError::InvalidRateLimit { reason: "window must be positive" });
		}
		if window > Self::MAX_DURATION {
			return Err(ConfigError::InvalidRateLimit { reason: "window exceeds 365 days" });
		}
		if !block_duration.is_positive() {
			return Err(ConfigError::InvalidRateLimit {
				reason: "block duration must be positive",
			});
		}
		if block_duration > Self::MAX_DURATION {
			return Err(ConfigError::InvalidRateLimit { reason: "block duration exceeds 365 days" });
		}

		Ok(Self { max_attempts, window, block_duration })
	}

	/// Builds a policy from loaded configuration.
	pub fn from_config(config: &RateLimitConfig) -> Result<Self, ConfigError> {
		let secs =
			|value: u64| i64::try_from(value).map(Duration::seconds).unwrap_or(Duration::MAX);

		Self::new(config.max_attempts, secs(config.window_secs), secs(config.block_secs))
	}

	/// Attempt budget per window.
	pub fn max_attempts(&self) -> u32 {
		self.max_attempts
	}

	/// Window length.
	pub fn window(&self) -> Duration {
		self.window
	}

	/// Cool-down applied once the budget is exhausted.
	pub fn block_duration(&self) -> Duration {
		self.block_duration
	}

	/// Evaluates `entry` at `now` without recording anything.
	///
	/// A missing or elapsed entry grants the full budget.
	pub fn check(&self, now: OffsetDateTime, entry: Option<&RateLimitEntry>) -> RateLimitStatus {
		match entry.filter(|entry| !entry.is_expired_at(now)) {
			Some(entry) => RateLimitStatus {
				allowed: entry.count < self.max_attempts,
				remaining: self.max_attempts.saturating_sub(entry.count),
				reset_time: entry.reset_time,
			},
			None => RateLimitStatus {
				allowed: true,
				remaining: self.max_attempts,
				reset_time: now + self.window,
			},
		}
	}

	/// Records one failed attempt and returns the entry to persist.
	///
	/// Reaching the budget converts the window into a block measured from this attempt;
	/// further failures while blocked re-arm the block.
	pub fn record_failure(
		&self,
		now: OffsetDateTime,
		entry: Option<RateLimitEntry>,
	) -> RateLimitEntry {
		let mut next = match entry.filter(|entry| !entry.is_expired_at(now)) {
			Some(entry) => RateLimitEntry { count: entry.count.saturating_add(1), ..entry },
			None => RateLimitEntry { count: 1, reset_time: now + self.window },
		};

		if next.count >= self.max_attempts {
			next.reset_time = now + self.block_duration;
		}

		next
	}
}
impl Default for RateLimitPolicy {
	fn default() -> Self {
		Self {
			max_attempts: 5,
			window: Duration::minutes(15),
			block_duration: Duration::minutes(30),
		}
	}
}
