//! Session and backing-environment records.
//!
//! Provisioning yields an [`Environment`]: a running container with reachable
//! endpoints but no WebDriver session yet. Once the hub confirms session
//! creation, the environment is promoted into a [`SessionRecord`] carrying the
//! hub-assigned session id. The two types encode the "id assigned only after
//! creation" lifecycle.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use wdproxy_protocol::SessionEntry;

/// Container ids backing one environment, one per exposed port class.
///
/// Browser images expose all three ports from a single container, so the
/// names usually coincide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Containers {
	/// Serves the WebDriver endpoint.
	pub primary: String,
	/// Serves raw VNC.
	pub visual_stream: String,
	/// Serves the noVNC websocket proxy.
	pub visual_stream_proxy: String,
}

impl Containers {
	/// All three classes served by one container.
	pub fn single(name: impl Into<String>) -> Self {
		let name = name.into();
		Self {
			primary: name.clone(),
			visual_stream: name.clone(),
			visual_stream_proxy: name,
		}
	}

	/// Distinct container names, primary first.
	pub fn distinct(&self) -> Vec<&str> {
		let mut out: Vec<&str> = Vec::with_capacity(3);
		for name in [&self.primary, &self.visual_stream, &self.visual_stream_proxy] {
			if !out.contains(&name.as_str()) {
				out.push(name);
			}
		}
		out
	}
}

/// A provisioned, reachable browser environment.
#[derive(Debug, Clone)]
pub struct Environment {
	/// WebDriver base URL, e.g. `http://127.0.0.1:32768/wd/hub`.
	pub hub_url: String,
	/// Visual-stream URL handed to observers.
	pub vnc_url: String,
	pub containers: Containers,
	/// Browser family the image was resolved for.
	pub browser: String,
	/// Version resolved from the image tag.
	pub version: String,
	/// Unix timestamp (seconds).
	pub created_at: u64,
	/// Caller manages recording itself.
	pub manual_recording: bool,
	/// Opaque client-supplied correlation id.
	pub correlation_id: Option<String>,
}

impl Environment {
	/// Attaches the hub-assigned session id.
	pub fn into_session(self, session_id: String, interactive: bool, timeout: Duration) -> SessionRecord {
		SessionRecord {
			session_id,
			interactive,
			timeout,
			environment: self,
			expiry: CancellationToken::new(),
		}
	}
}

/// A live WebDriver session and the environment backing it.
#[derive(Debug, Clone)]
pub struct SessionRecord {
	pub session_id: String,
	/// Interactive sessions are exempt from the inactivity timeout and are not
	/// announced to observers.
	pub interactive: bool,
	pub timeout: Duration,
	pub environment: Environment,
	expiry: CancellationToken,
}

impl SessionRecord {
	pub fn hub_url(&self) -> &str {
		&self.environment.hub_url
	}

	/// Name of the container serving the WebDriver endpoint.
	pub fn hub_container(&self) -> &str {
		&self.environment.containers.primary
	}

	/// Token shared with the session's inactivity timer; cancelling it
	/// disarms the timer.
	pub fn expiry_token(&self) -> &CancellationToken {
		&self.expiry
	}

	/// Summary pushed to observers.
	pub fn entry(&self) -> SessionEntry {
		SessionEntry {
			id: self.session_id.clone(),
			url: self.environment.vnc_url.clone(),
			browser: self.environment.browser.clone(),
			version: self.environment.version.clone(),
			creation_time: self.environment.created_at,
			hub_container_name: self.hub_container().to_string(),
		}
	}
}

pub(crate) fn now_ts() -> u64 {
	std::time::SystemTime::now()
		.duration_since(std::time::UNIX_EPOCH)
		.unwrap_or_default()
		.as_secs()
}
