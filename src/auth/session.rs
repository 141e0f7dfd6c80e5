//! Credential pair held by the trusted execution context.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Short-lived access credential plus the long-lived refresh secret that renews it.
///
/// The pair is always replaced as a unit; stores must never persist one half without the
/// other.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTokens {
	/// Bearer credential attached to outbound requests.
	pub access_token: TokenSecret,
	/// Refresh-scoped secret, if the service issued one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<TokenSecret>,
}
impl SessionTokens {
	/// Creates a pair from an access credential and an optional refresh secret.
	pub fn new(access_token: impl Into<TokenSecret>, refresh_token: Option<TokenSecret>) -> Self {
		Self { access_token: access_token.into(), refresh_token }
	}

	/// Keeps `previous` as the refresh secret when the service did not rotate it.
	pub fn or_refresh_token(mut self, previous: Option<TokenSecret>) -> Self {
		if self.refresh_token.is_none() {
			self.refresh_token = previous;
		}

		self
	}
}
impl Debug for SessionTokens {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionTokens")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn missing_rotation_keeps_previous_refresh_secret() {
		let rotated = SessionTokens::new("access-2", None)
			.or_refresh_token(Some(TokenSecret::new("refresh-1")));

		assert_eq!(rotated.refresh_token.as_ref().map(TokenSecret::expose), Some("refresh-1"));

		let replaced = SessionTokens::new("access-3", Some(TokenSecret::new("refresh-3")))
			.or_refresh_token(Some(TokenSecret::new("refresh-1")));

		assert_eq!(replaced.refresh_token.as_ref().map(TokenSecret::expose), Some("refresh-3"));
	}

	#[test]
	fn debug_output_redacts_both_secrets() {
		let tokens = SessionTokens::new("access", Some(TokenSecret::new("refresh")));
		let rendered = format!("{tokens:?}");

		assert!(!rendered.contains("access\""));
		assert!(!rendered.contains("refresh\""));
		assert!(rendered.contains("<redacted>"));
	}

	#[test]
	fn deserializes_service_payload_without_refresh_secret() {
		let tokens: SessionTokens = serde_json::from_str("{\"access_token\":\"a\"}")
			.expect("Payload without refresh_token should deserialize.");

		assert_eq!(tokens.access_token.expose(), "a");
		assert!(tokens.refresh_token.is_none());
	}
}
