//! Request classification.
//!
//! Paths are relative to the proxy's WebDriver context (e.g. `/session/abc/url`
//! for an inbound `/wd/hub/session/abc/url`).

use reqwest::Method;

/// What the orchestrator should do with an inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
	/// `POST <marker>`: provision an environment and create a session.
	CreateSession,
	/// `DELETE <marker>/<id>`: relay, then tear the session down.
	DeleteSession(String),
	/// Any other request addressed to a session.
	Command(String),
	/// No session id could be resolved from the path.
	Unmatched,
}

impl Route {
	pub fn session_id(&self) -> Option<&str> {
		match self {
			Route::DeleteSession(id) | Route::Command(id) => Some(id),
			Route::CreateSession | Route::Unmatched => None,
		}
	}
}

/// Classifies a request against the session-collection `marker`.
pub fn classify(method: &Method, path: &str, marker: &str) -> Route {
	let path = normalize(path);

	if *method == Method::POST && path.trim_end_matches('/') == marker {
		return Route::CreateSession;
	}

	let Some(session_id) = session_id_from_path(path, marker) else {
		return Route::Unmatched;
	};

	let is_exact_delete = *method == Method::DELETE
		&& path
			.strip_prefix(marker)
			.and_then(|rest| rest.strip_prefix('/'))
			.is_some_and(|rest| rest == session_id);

	if is_exact_delete {
		Route::DeleteSession(session_id.to_string())
	} else {
		Route::Command(session_id.to_string())
	}
}

/// Takes the path segment that follows `marker`, whatever comes after it.
///
/// `/session/abc123/element` yields `abc123`.
pub fn session_id_from_path<'a>(path: &'a str, marker: &str) -> Option<&'a str> {
	let start = path.find(marker)? + marker.len();
	let rest = path[start..].strip_prefix('/')?;
	let id = rest.split('/').next().unwrap_or_default();
	(!id.is_empty()).then_some(id)
}

/// Collapses leading slashes (`//session` → `/session`).
fn normalize(path: &str) -> &str {
	let trimmed = path.trim_start_matches('/');
	if trimmed.len() == path.len() {
		path
	} else {
		&path[path.len() - trimmed.len() - 1..]
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const MARKER: &str = "/session";

	#[test]
	fn resolves_id_regardless_of_suffix() {
		assert_eq!(session_id_from_path("/session/abc123/element", MARKER), Some("abc123"));
		assert_eq!(session_id_from_path("/session/abc123", MARKER), Some("abc123"));
		assert_eq!(session_id_from_path("/session/abc123/window/current/maximize", MARKER), Some("abc123"));
		assert_eq!(session_id_from_path("/session", MARKER), None);
		assert_eq!(session_id_from_path("/session/", MARKER), None);
		assert_eq!(session_id_from_path("/status", MARKER), None);
		assert_eq!(session_id_from_path("/sessions/abc", MARKER), None);
	}

	#[test]
	fn exact_delete_triggers_teardown() {
		assert_eq!(
			classify(&Method::DELETE, "/session/abc123", MARKER),
			Route::DeleteSession("abc123".into())
		);
	}

	#[test]
	fn nested_delete_is_a_plain_command() {
		assert_eq!(
			classify(&Method::DELETE, "/session/abc123/element", MARKER),
			Route::Command("abc123".into())
		);
		assert_eq!(
			classify(&Method::DELETE, "/session/abc123/cookie/name", MARKER),
			Route::Command("abc123".into())
		);
	}

	#[test]
	fn create_is_post_on_marker() {
		assert_eq!(classify(&Method::POST, "/session", MARKER), Route::CreateSession);
		assert_eq!(classify(&Method::POST, "//session", MARKER), Route::CreateSession);
		assert_eq!(classify(&Method::GET, "/session", MARKER), Route::Unmatched);
		assert_eq!(
			classify(&Method::POST, "/session/abc/url", MARKER),
			Route::Command("abc".into())
		);
	}

	#[test]
	fn routes_expose_their_session() {
		assert_eq!(classify(&Method::GET, "/session/abc/url", MARKER).session_id(), Some("abc"));
		assert_eq!(classify(&Method::DELETE, "/session/abc", MARKER).session_id(), Some("abc"));
		assert_eq!(classify(&Method::POST, "/session", MARKER).session_id(), None);
		assert_eq!(classify(&Method::GET, "/status", MARKER).session_id(), None);
	}

	#[test]
	fn normalize_keeps_one_leading_slash() {
		assert_eq!(normalize("///session/a"), "/session/a");
		assert_eq!(normalize("/session"), "/session");
		assert_eq!(normalize("session"), "session");
	}
}
