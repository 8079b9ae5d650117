//! HTTP rendering of engine errors.

use axum::http::header;
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};
use wdproxy_protocol::ErrorBody;

const JSON_CONTENT_TYPE: &str = "application/json;charset=utf-8";

/// Engine error as returned from a handler.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub wdproxy::Error);

impl ApiError {
	pub fn body(&self) -> ErrorBody {
		let status = self.0.status();
		ErrorBody {
			status: status.as_u16(),
			error: self.0.kind().to_string(),
			message: self.0.to_string(),
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		// Errors from a live hub keep the hub's own status and body.
		if let wdproxy::Error::Upstream { status, body } = self.0 {
			debug!(target: "wdproxy.server", %status, "relaying hub error");
			return (status, [(header::CONTENT_TYPE, JSON_CONTENT_TYPE)], body).into_response();
		}

		let status = self.0.status();
		let body = self.body();
		if status.is_server_error() {
			warn!(target: "wdproxy.server", %status, error = %self.0, "request failed");
		} else {
			debug!(target: "wdproxy.server", %status, error = %self.0, "request rejected");
		}
		(status, axum::Json(body)).into_response()
	}
}

#[cfg(test)]
mod tests {
	use axum::http::StatusCode;

	use super::*;

	#[test]
	fn body_carries_status_kind_and_message() {
		let body = ApiError(wdproxy::Error::UnknownSession("abc".into())).body();
		assert_eq!(body.status, 404);
		assert_eq!(body.error, "invalid session id");
		assert!(body.message.contains("abc"));
	}

	#[test]
	fn hub_errors_pass_through() {
		let response = ApiError(wdproxy::Error::Upstream {
			status: StatusCode::CONFLICT,
			body: "{}".into(),
		})
		.into_response();
		assert_eq!(response.status(), StatusCode::CONFLICT);
	}

	#[test]
	fn fatal_provisioning_is_a_server_error() {
		let response = ApiError(wdproxy::Error::FatalProvisioning { retries: 3 }).into_response();
		assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
	}
}
