//! Capability payload parsing.
//!
//! A new-session body is parsed once into [`Capabilities`], a tagged union of
//! the legacy JSON Wire shape and the W3C shape. The legacy shape is tried
//! first; the W3C `alwaysMatch` set is the fallback when the legacy one names
//! no browser.

use serde_json::Value;
use wdproxy_protocol::{AlwaysMatch, DesiredCapabilities, LegacyEnvelope, W3cEnvelope};

use crate::error::{Error, Result};

/// Capabilities recognised in a new-session request.
#[derive(Debug, Clone)]
pub enum Capabilities {
	/// `desiredCapabilities` carried a browser name.
	Legacy(DesiredCapabilities),
	/// Only `capabilities.alwaysMatch` carried a browser name.
	Modern(AlwaysMatch),
}

impl Capabilities {
	/// Parses a raw request body.
	///
	/// Fails with [`Error::MalformedCapabilities`] when neither shape yields a
	/// browser name, including when the body is not JSON at all.
	pub fn parse_body(body: &str) -> Result<(Value, Self)> {
		let document: Value = serde_json::from_str(body)
			.map_err(|e| Error::MalformedCapabilities(format!("request body is not JSON: {e}")))?;
		let caps = Self::parse(&document)?;
		Ok((document, caps))
	}

	/// Parses an already decoded request document.
	pub fn parse(document: &Value) -> Result<Self> {
		let legacy = serde_json::from_value::<LegacyEnvelope>(document.clone())
			.ok()
			.and_then(|env| env.desired_capabilities)
			.filter(|caps| has_name(caps.browser_name.as_deref()));
		if let Some(caps) = legacy {
			return Ok(Capabilities::Legacy(caps));
		}

		let modern = serde_json::from_value::<W3cEnvelope>(document.clone())
			.ok()
			.and_then(|env| env.capabilities)
			.and_then(|caps| caps.always_match)
			.filter(|caps| has_name(caps.browser_name.as_deref()));
		match modern {
			Some(caps) => Ok(Capabilities::Modern(caps)),
			None => Err(Error::MalformedCapabilities(
				"browser name not recognized in request".to_string(),
			)),
		}
	}

	pub fn browser_name(&self) -> &str {
		let name = match self {
			Capabilities::Legacy(c) => c.browser_name.as_deref(),
			Capabilities::Modern(c) => c.browser_name.as_deref(),
		};
		name.unwrap_or_default()
	}

	pub fn version(&self) -> Option<&str> {
		match self {
			Capabilities::Legacy(c) => c.version.as_deref(),
			Capabilities::Modern(c) => c.browser_version.as_deref(),
		}
	}

	pub fn platform(&self) -> Option<&str> {
		match self {
			Capabilities::Legacy(c) => c.platform.as_deref(),
			Capabilities::Modern(c) => c.platform_name.as_deref(),
		}
	}

	/// Interactive sessions never expire.
	pub fn live(&self) -> bool {
		match self {
			Capabilities::Legacy(c) => c.live,
			Capabilities::Modern(c) => c.live,
		}
	}

	pub fn manual_recording(&self) -> bool {
		match self {
			Capabilities::Legacy(c) => c.manual_recording,
			Capabilities::Modern(c) => c.manual_recording,
		}
	}

	pub fn correlation_id(&self) -> Option<&str> {
		match self {
			Capabilities::Legacy(c) => c.browser_id.as_deref(),
			Capabilities::Modern(c) => c.browser_id.as_deref(),
		}
	}

	/// Case-insensitive browser family check.
	pub fn is_browser(&self, family: &str) -> bool {
		self.browser_name().eq_ignore_ascii_case(family)
	}
}

fn has_name(name: Option<&str>) -> bool {
	name.is_some_and(|n| !n.is_empty())
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn legacy_shape_is_preferred() {
		let doc = json!({
			"desiredCapabilities": {"browserName": "chrome", "version": "74", "live": true},
			"capabilities": {"alwaysMatch": {"browserName": "firefox"}}
		});
		let caps = Capabilities::parse(&doc).unwrap();
		assert!(matches!(caps, Capabilities::Legacy(_)));
		assert_eq!(caps.browser_name(), "chrome");
		assert_eq!(caps.version(), Some("74"));
		assert!(caps.live());
	}

	#[test]
	fn falls_back_to_always_match() {
		let doc = json!({
			"desiredCapabilities": {"platform": "ANY"},
			"capabilities": {"alwaysMatch": {"browserName": "firefox", "browserVersion": "66", "manualRecording": true, "browserId": "tjob-1"}}
		});
		let caps = Capabilities::parse(&doc).unwrap();
		assert!(matches!(caps, Capabilities::Modern(_)));
		assert_eq!(caps.browser_name(), "firefox");
		assert_eq!(caps.version(), Some("66"));
		assert!(caps.manual_recording());
		assert_eq!(caps.correlation_id(), Some("tjob-1"));
	}

	#[test]
	fn missing_browser_in_both_shapes_is_malformed() {
		for doc in [
			json!({}),
			json!({"desiredCapabilities": {}}),
			json!({"desiredCapabilities": {"browserName": ""}, "capabilities": {"alwaysMatch": {}}}),
			json!({"capabilities": {"firstMatch": [{"browserName": "chrome"}]}}),
		] {
			let err = Capabilities::parse(&doc).unwrap_err();
			assert!(matches!(err, Error::MalformedCapabilities(_)), "{doc}");
		}
	}

	#[test]
	fn non_json_body_is_malformed() {
		let err = Capabilities::parse_body("browserName=chrome").unwrap_err();
		assert!(matches!(err, Error::MalformedCapabilities(_)));
	}

	#[test]
	fn numeric_version_keeps_legacy_browser() {
		let caps = Capabilities::parse(&json!({"desiredCapabilities": {"browserName": "chrome", "version": 74}})).unwrap();
		assert!(matches!(caps, Capabilities::Legacy(_)));
		assert_eq!(caps.browser_name(), "chrome");
		assert_eq!(caps.version(), Some("74"));
	}

	#[test]
	fn string_flags_keep_legacy_browser() {
		let caps = Capabilities::parse(&json!({
			"desiredCapabilities": {"browserName": "chrome", "live": "true", "manualRecording": "yes"}
		}))
		.unwrap();
		assert!(caps.is_browser("CHROME"));
		assert!(caps.live());
		assert!(!caps.manual_recording());
	}
}
