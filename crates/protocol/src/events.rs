//! Events pushed to session observers over the WebSocket hub.
//!
//! Each event serializes as a single-key object naming the event, e.g.
//! `{"newSession": {"id": "...", "url": "...", ...}}`.

use serde::{Deserialize, Serialize};

/// Session summary shown to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEntry {
	/// Session id as assigned by the browser hub.
	pub id: String,
	/// Visual-stream (noVNC) URL for watching the browser.
	pub url: String,
	pub browser: String,
	pub version: String,
	/// Unix timestamp (seconds) of environment creation.
	pub creation_time: u64,
	/// Name of the container backing the session's protocol endpoint.
	pub hub_container_name: String,
}

/// Event fanned out to every connected observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ObserverEvent {
	/// A non-interactive session finished its create handshake.
	NewSession(SessionEntry),
	/// A non-interactive session was torn down.
	RemoveSession(SessionEntry),
	/// Recording artifacts for a session are available.
	RecordedSession(SessionEntry),
}
