//! Client identity derivation for rate-limit keys.

// std
use std::net::{IpAddr, SocketAddr};
// crates.io
use http::HeaderMap;
// self
use crate::_prelude::*;

/// Headers consulted for the originating client address, most trusted first.
pub const CLIENT_IP_HEADERS: [&str; 5] =
	["x-forwarded-for", "x-real-ip", "cf-connecting-ip", "true-client-ip", "x-client-ip"];

/// Address of the client that originated a login attempt.
///
/// When no header yields an address the identity degrades to [`ClientIdentity::UNKNOWN`],
/// which places every such caller in one shared bucket.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClientIdentity(String);
impl ClientIdentity {
	/// Sentinel used when the client address cannot be determined.
	pub const UNKNOWN: &'static str = "unknown";

	/// Derives the identity from proxy headers.
	///
	/// `x-forwarded-for` contributes only its first hop. Values that are not an IP address
	/// (optionally with a port) are skipped.
	pub fn from_headers(headers: &HeaderMap) -> Self {
		let found = CLIENT_IP_HEADERS.iter().find_map(|name| {
			headers
				.get_all(*name)
				.iter()
				.filter_map(|value| value.to_str().ok())
				.find_map(|value| parse_address(value.split(',').next().unwrap_or_default()))
		});

		match found {
			Some(ip) => Self(ip.to_string()),
			None => {
				#[cfg(feature = "tracing")]
				tracing::warn!("client address unavailable; rate limiting under the shared bucket");

				Self::unknown()
			},
		}
	}

	/// Identity from a known address.
	pub fn from_ip(ip: IpAddr) -> Self {
		Self(ip.to_string())
	}

	/// Shared fallback identity.
	pub fn unknown() -> Self {
		Self(Self::UNKNOWN.into())
	}

	/// Returns `true` for the fallback identity.
	pub fn is_unknown(&self) -> bool {
		self.0 == Self::UNKNOWN
	}

	/// Address (or sentinel) as text.
	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Identity qualified by a limiter namespace, e.g. `login:203.0.113.9`.
	pub fn scoped(&self, namespace: &str) -> String {
		format!("{namespace}:{}", self.0)
	}
}
impl Display for ClientIdentity {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

fn parse_address(raw: &str) -> Option<IpAddr> {
	let raw = raw.trim();

	raw.parse::<IpAddr>().ok().or_else(|| raw.parse::<SocketAddr>().ok().map(|addr| addr.ip()))
}
