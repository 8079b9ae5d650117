//! Capability payload shapes accepted on `POST /session`.
//!
//! Two shapes are in circulation:
//!
//! - the legacy JSON Wire shape, `{"desiredCapabilities": {...}}`
//! - the W3C shape, `{"capabilities": {"alwaysMatch": {...}, "firstMatch": [...]}}`
//!
//! Clients frequently send both at once. Every field is optional on the wire;
//! unknown fields are ignored here and preserved by the rewriter, which works
//! on the raw JSON tree instead of these structs.
//!
//! Field decoding is lenient: a version sent as a number still reads as a
//! string, `"true"` reads as a flag, and a value of any other type reads as
//! absent. One odd field never hides the browser name.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Top-level envelope of the legacy JSON Wire new-session request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyEnvelope {
	#[serde(default)]
	pub desired_capabilities: Option<DesiredCapabilities>,
}

/// Legacy `desiredCapabilities` object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DesiredCapabilities {
	#[serde(deserialize_with = "lenient_string")]
	pub browser_name: Option<String>,
	#[serde(deserialize_with = "lenient_string")]
	pub version: Option<String>,
	#[serde(deserialize_with = "lenient_string")]
	pub platform: Option<String>,
	/// Interactive session, exempt from the inactivity timeout.
	#[serde(deserialize_with = "lenient_flag")]
	pub live: bool,
	/// The client drives recording start/stop itself.
	#[serde(deserialize_with = "lenient_flag")]
	pub manual_recording: bool,
	/// Opaque client correlation id. Stripped before forwarding.
	#[serde(deserialize_with = "lenient_string")]
	pub browser_id: Option<String>,
}

/// Top-level envelope of the W3C new-session request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct W3cEnvelope {
	#[serde(default)]
	pub capabilities: Option<W3cCapabilities>,
}

/// W3C `capabilities` object. Only `alwaysMatch` is consulted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct W3cCapabilities {
	pub always_match: Option<AlwaysMatch>,
}

/// W3C `alwaysMatch` capability set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AlwaysMatch {
	#[serde(deserialize_with = "lenient_string")]
	pub browser_name: Option<String>,
	#[serde(deserialize_with = "lenient_string")]
	pub browser_version: Option<String>,
	#[serde(deserialize_with = "lenient_string")]
	pub platform_name: Option<String>,
	#[serde(deserialize_with = "lenient_flag")]
	pub live: bool,
	#[serde(deserialize_with = "lenient_flag")]
	pub manual_recording: bool,
	#[serde(deserialize_with = "lenient_string")]
	pub browser_id: Option<String>,
}

/// Strings as-is, numbers and booleans in their JSON spelling.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(match Value::deserialize(deserializer)? {
		Value::String(s) => Some(s),
		Value::Number(n) => Some(n.to_string()),
		Value::Bool(b) => Some(b.to_string()),
		Value::Null | Value::Array(_) | Value::Object(_) => None,
	})
}

/// `true`, `"true"` (any case) and non-zero numbers are set.
fn lenient_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(match Value::deserialize(deserializer)? {
		Value::Bool(b) => b,
		Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
		Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
		Value::Null | Value::Array(_) | Value::Object(_) => false,
	})
}
