//! Per-execution-context credential strategies.
//!
//! The request client never decides *how* a credential is obtained. It asks a
//! [`CredentialResolver`] chosen once at construction:
//!
//! - [`TrustedCredentials`] reads the credential pair from a server-held [`SessionStore`] and
//!   refreshes it by calling a [`TokenRefresher`] directly.
//! - [`DelegatedCredentials`] never attaches a credential (a fronting proxy injects it) and
//!   refreshes by calling the proxy's refresh endpoint.
//!
//! [`SessionStore`]: crate::store::SessionStore

pub mod delegated;
pub mod trusted;

pub use delegated::*;
pub use trusted::*;

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Boxed future returned by [`CredentialResolver`] operations.
pub type CredentialFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a + Send>>;

/// Execution context a client runs in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExecutionContext {
	/// Server-side code holding the credential pair itself.
	Trusted,
	/// Edge or browser code whose requests are proxied through a server that injects the
	/// credential.
	Delegated,
}
impl ExecutionContext {
	/// Returns a stable label suitable for logs and error messages.
	pub const fn as_str(self) -> &'static str {
		match self {
			ExecutionContext::Trusted => "trusted",
			ExecutionContext::Delegated => "delegated",
		}
	}
}
impl Display for ExecutionContext {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Strategy that produces the outbound credential and renews it on expiry.
pub trait CredentialResolver
where
	Self: Send + Sync,
{
	/// Context this resolver serves; decides which base address the client uses.
	fn context(&self) -> ExecutionContext;

	/// Returns the credential to attach right now, re-reading the backing store on every call.
	fn current_credential(&self) -> CredentialFuture<'_, Result<Option<TokenSecret>>>;

	/// Renews the credential; `true` means the next [`current_credential`] call observes the
	/// new value.
	///
	/// A failed refresh must leave the resolver reporting no credential rather than the
	/// known-invalid one.
	///
	/// [`current_credential`]: CredentialResolver::current_credential
	fn refresh(&self) -> CredentialFuture<'_, bool>;
}
