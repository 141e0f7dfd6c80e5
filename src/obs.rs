//! Optional observability helpers for client and limiter operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `booth_auth.operation` with the
//!   `operation` and `stage` (call site) fields, plus warn-level events on refresh failures,
//!   blocked logins, and unresolvable client identities.
//! - Enable `metrics` to increment the `booth_auth_operation_total` counter for every
//!   attempt/success/failure, labeled by `operation` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
	/// Authenticated request through the client.
	Request,
	/// Credential refresh performed by the coordinator.
	Refresh,
	/// Rate-limit check or mutation.
	RateLimit,
	/// Login flow gated by the rate limiter.
	Login,
}
impl Operation {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Operation::Request => "request",
			Operation::Refresh => "refresh",
			Operation::RateLimit => "rate_limit",
			Operation::Login => "login",
		}
	}
}
impl Display for Operation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl Outcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Outcome::Attempt => "attempt",
			Outcome::Success => "success",
			Outcome::Failure => "failure",
		}
	}

	/// Maps a result onto the success/failure label.
	pub fn of<T, E>(result: &Result<T, E>) -> Self {
		if result.is_ok() { Outcome::Success } else { Outcome::Failure }
	}
}
impl Display for Outcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
