//! Error types for the Docker-backed collaborators.

use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
	#[error("failed to launch {program}: {source}")]
	Spawn {
		program: String,
		#[source]
		source: std::io::Error,
	},

	#[error("`{command}` exited with status {status}: {stderr}")]
	CommandFailed {
		command: String,
		status: i32,
		stderr: String,
	},

	#[error("{url} not reachable within {}s", .timeout.as_secs())]
	Unreachable { url: String, timeout: Duration },

	#[error("failed to build HTTP client: {0}")]
	Http(#[from] reqwest::Error),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),
}

impl From<Error> for wdproxy::Error {
	fn from(err: Error) -> Self {
		match err {
			Error::Io(source) => wdproxy::Error::Io(source),
			Error::Json(source) => wdproxy::Error::Json(source),
			other => wdproxy::Error::ProvisioningFailed(other.to_string()),
		}
	}
}
