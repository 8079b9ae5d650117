//! Error taxonomy for the session engine.

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while classifying, provisioning, relaying or tearing down sessions.
#[derive(Debug, Error)]
pub enum Error {
	/// The new-session payload names no browser in either supported shape.
	/// Terminal; never retried.
	#[error("malformed capabilities: {0}")]
	MalformedCapabilities(String),

	/// One provisioning attempt failed (port allocation, container start,
	/// reachability wait). Retried by the create flow.
	#[error("provisioning failed: {0}")]
	ProvisioningFailed(String),

	/// Every create attempt in the retry budget failed.
	#[error("exception creating session in remote browser (num retries {retries})")]
	FatalProvisioning { retries: u32 },

	/// No live session matches the id in the request path.
	#[error("unknown session: {0}")]
	UnknownSession(String),

	/// Raised after a session expired and its teardown already ran.
	#[error("timeout of {} seconds in session {session_id}", .timeout.as_secs())]
	SessionTimedOut { session_id: String, timeout: Duration },

	/// A live browser hub answered with a non-success status. The status and
	/// body are relayed to the client unchanged.
	#[error("browser hub responded {status}")]
	Upstream { status: StatusCode, body: String },

	/// The hub could not be reached outside of a create exchange.
	#[error("transport error talking to {url}: {source}")]
	Transport {
		url: String,
		#[source]
		source: reqwest::Error,
	},

	/// A create exchange succeeded but no session id could be extracted.
	#[error("create-session response carried no session id: {0}")]
	InvalidSessionResponse(String),

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Io(#[from] std::io::Error),
}

impl Error {
	/// HTTP status surfaced to the WebDriver client.
	pub fn status(&self) -> StatusCode {
		match self {
			Error::MalformedCapabilities(_) => StatusCode::BAD_REQUEST,
			Error::UnknownSession(_) => StatusCode::NOT_FOUND,
			Error::Upstream { status, .. } => *status,
			Error::Transport { .. } => StatusCode::BAD_GATEWAY,
			Error::ProvisioningFailed(_)
			| Error::FatalProvisioning { .. }
			| Error::SessionTimedOut { .. }
			| Error::InvalidSessionResponse(_)
			| Error::Json(_)
			| Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	/// WebDriver-style error kind used in JSON error bodies.
	pub fn kind(&self) -> &'static str {
		match self {
			Error::MalformedCapabilities(_) => "invalid argument",
			Error::ProvisioningFailed(_) | Error::FatalProvisioning { .. } | Error::InvalidSessionResponse(_) => {
				"session not created"
			}
			Error::UnknownSession(_) => "invalid session id",
			Error::SessionTimedOut { .. } => "timeout",
			Error::Upstream { .. } | Error::Transport { .. } | Error::Json(_) | Error::Io(_) => "unknown error",
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fatal_provisioning_message_names_retry_count() {
		let err = Error::FatalProvisioning { retries: 3 };
		assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
		assert!(err.to_string().contains("num retries 3"));
	}

	#[test]
	fn upstream_status_is_relayed() {
		let err = Error::Upstream {
			status: StatusCode::IM_A_TEAPOT,
			body: "{}".into(),
		};
		assert_eq!(err.status(), StatusCode::IM_A_TEAPOT);
	}

	#[test]
	fn timed_out_message_reports_seconds() {
		let err = Error::SessionTimedOut {
			session_id: "abc".into(),
			timeout: Duration::from_secs(90),
		};
		assert_eq!(err.to_string(), "timeout of 90 seconds in session abc");
	}
}
