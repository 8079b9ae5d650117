//! Bodies produced by the proxy itself rather than relayed from a hub.

use serde::{Deserialize, Serialize};

/// `GET /status` payload, wrapped as `{"value": StatusBody}` on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusBody {
	pub ready: bool,
	pub message: String,
	/// Browser families this proxy can provision.
	pub browsers: Vec<String>,
}

/// Error body for failures raised by the proxy.
///
/// Errors relayed from a live browser hub keep the hub's own body instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
	/// HTTP status code, repeated in the body for JSON Wire clients.
	pub status: u16,
	/// Machine-readable error kind.
	pub error: String,
	pub message: String,
}
