//! Extraction of human-readable messages from downstream error bodies.
//!
//! Accepted shapes, in priority order:
//!
//! 1. a top-level array of validation errors, each carrying `msg`;
//! 2. an object whose `detail` is a string or such an array;
//! 3. an object with a `message` string.
//!
//! Anything else falls back to the response's status text. Validation messages lose their
//! `"Value error, "` prefix and are joined with `", "`.

// crates.io
use http::StatusCode;
use serde_json::Value;

const VALUE_ERROR_PREFIX: &str = "Value error, ";

/// Returns the message to surface for a failed response.
pub fn extract_message(status: StatusCode, body: &[u8]) -> String {
	parse_message(body).unwrap_or_else(|| status_text(status))
}

/// Parses a message from `body`, or `None` when the body has no recognized shape.
pub fn parse_message(body: &[u8]) -> Option<String> {
	let value = serde_json::from_slice::<Value>(body).ok()?;

	match &value {
		Value::Array(items) => validation_messages(items),
		Value::Object(map) => {
			let detail = match map.get("detail") {
				Some(Value::String(detail)) => non_empty(detail),
				Some(Value::Array(items)) => validation_messages(items),
				_ => None,
			};

			detail.or_else(|| map.get("message").and_then(Value::as_str).and_then(non_empty))
		},
		_ => None,
	}
}

/// Canonical reason phrase for `status`, e.g. `Unprocessable Entity`.
pub fn status_text(status: StatusCode) -> String {
	status
		.canonical_reason()
		.map(str::to_owned)
		.unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}

fn validation_messages(items: &[Value]) -> Option<String> {
	let messages = items
		.iter()
		.filter_map(|item| item.get("msg").and_then(Value::as_str))
		.map(|msg| msg.strip_prefix(VALUE_ERROR_PREFIX).unwrap_or(msg))
		.filter(|msg| !msg.is_empty())
		.collect::<Vec<_>>();

	if messages.is_empty() { None } else { Some(messages.join(", ")) }
}

fn non_empty(value: &str) -> Option<String> {
	if value.is_empty() { None } else { Some(value.to_owned()) }
}
