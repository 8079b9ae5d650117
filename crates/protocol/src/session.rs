//! Create-session response shapes returned by browser hubs.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Union of the two JSON response shapes carrying a new session id.
///
/// Older hubs answer `{"sessionId": "...", "status": 0, "value": {...}}`;
/// W3C-era hubs nest it as `{"value": {"sessionId": "...", "capabilities": {...}}}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewSessionResponse {
	pub session_id: Option<String>,
	pub value: Option<Value>,
}

impl NewSessionResponse {
	/// Returns the flat id if present, otherwise the id nested under `value`.
	pub fn session_id(&self) -> Option<&str> {
		self.session_id.as_deref().or_else(|| {
			self.value
				.as_ref()
				.and_then(|v| v.get("sessionId"))
				.and_then(Value::as_str)
		})
	}
}

/// Canonical JSON body synthesised for hubs that answer the create call
/// with a `302 Found` redirect to `.../session/<id>` instead of a body.
pub fn redirect_session_body(session_id: &str) -> Value {
	json!({ "sessionId": session_id, "status": 0, "value": {} })
}
