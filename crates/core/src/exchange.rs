//! Proxy exchange engine.
//!
//! Relays one request to a browser hub and normalizes the answer. Create
//! exchanges get their own (longer) timeout, and a transport failure during
//! a create is reported as `Ok(None)` so the caller can retry on a fresh
//! environment. A protocol error from a live hub is always an
//! [`Error::Upstream`] carrying the hub's status and body.

use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::debug;
use url::Url;
use wdproxy_protocol::redirect_session_body;

use crate::error::{Error, Result};

/// Headers that describe the inbound hop and must not be relayed.
const HOP_HEADERS: &[header::HeaderName] = &[
	header::HOST,
	header::CONTENT_LENGTH,
	header::CONNECTION,
	header::TRANSFER_ENCODING,
	header::ACCEPT_ENCODING,
	header::UPGRADE,
];

/// Inbound request, with `path` relative to the WebDriver context.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
	pub method: Method,
	pub path: String,
	pub headers: HeaderMap,
	pub body: String,
}

impl ProxyRequest {
	pub fn new(method: Method, path: impl Into<String>, body: impl Into<String>) -> Self {
		Self {
			method,
			path: path.into(),
			headers: HeaderMap::new(),
			body: body.into(),
		}
	}

	pub fn with_headers(mut self, headers: HeaderMap) -> Self {
		self.headers = headers;
		self
	}
}

/// Normalized hub response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyResponse {
	pub status: StatusCode,
	pub body: String,
}

impl ProxyResponse {
	pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
		Self {
			status,
			body: body.into(),
		}
	}

	/// Parses the body as JSON. Empty and non-JSON bodies yield `None`.
	pub fn json(&self) -> Option<Value> {
		serde_json::from_str(&self.body).ok()
	}
}

/// Raw outcome of one HTTP round trip.
struct RawResponse {
	status: StatusCode,
	location: Option<String>,
	body: String,
}

/// HTTP client wrapper that relays requests to browser hubs.
#[derive(Debug, Clone)]
pub struct Exchange {
	client: reqwest::Client,
	create_timeout: Duration,
	command_timeout: Duration,
}

impl Exchange {
	/// Builds the relay client. Redirects are never followed: a `302` from
	/// the create call is how some hubs announce the new session id.
	pub fn new(create_timeout: Duration, command_timeout: Duration) -> Result<Self> {
		let client = reqwest::Client::builder()
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.map_err(|source| Error::Transport {
				url: String::new(),
				source,
			})?;
		Ok(Self {
			client,
			create_timeout,
			command_timeout,
		})
	}

	/// Sends a create-session payload with the extended timeout.
	///
	/// Returns `Ok(None)` on a transport failure (connect error, timeout,
	/// truncated body) so the caller may retry on another environment.
	pub async fn create(&self, base_url: &str, request: &ProxyRequest) -> Result<Option<ProxyResponse>> {
		let url = join_url(base_url, &request.path);
		match self.round_trip(&url, request, self.create_timeout).await {
			Ok(raw) => normalize(raw).map(Some),
			Err(err) => {
				debug!(target: "wdproxy.exchange", %url, error = %err, "transport failure during create");
				Ok(None)
			}
		}
	}

	/// Relays any other command with the default timeout.
	pub async fn command(&self, base_url: &str, request: &ProxyRequest) -> Result<ProxyResponse> {
		let url = join_url(base_url, &request.path);
		let raw = self
			.round_trip(&url, request, self.command_timeout)
			.await
			.map_err(|source| Error::Transport { url, source })?;
		normalize(raw)
	}

	async fn round_trip(&self, url: &str, request: &ProxyRequest, timeout: Duration) -> reqwest::Result<RawResponse> {
		debug!(target: "wdproxy.exchange", method = %request.method, %url, body = %request.body, "-> request to browser");

		let response = self
			.client
			.request(request.method.clone(), url)
			.headers(forwardable(&request.headers, !request.body.is_empty()))
			.body(request.body.clone())
			.timeout(timeout)
			.send()
			.await?;

		let status = response.status();
		let location = response
			.headers()
			.get(header::LOCATION)
			.and_then(|v| v.to_str().ok())
			.map(str::to_owned);
		let body = response.text().await?;

		debug!(target: "wdproxy.exchange", %status, %body, "<- response from browser");
		Ok(RawResponse { status, location, body })
	}
}

/// Folds redirect-style create answers into a JSON body and turns non-success
/// statuses into [`Error::Upstream`].
fn normalize(raw: RawResponse) -> Result<ProxyResponse> {
	if raw.status == StatusCode::FOUND {
		if let Some(id) = raw.location.as_deref().and_then(session_id_from_location) {
			return Ok(ProxyResponse::new(StatusCode::OK, redirect_session_body(&id).to_string()));
		}
	}
	if !raw.status.is_success() {
		return Err(Error::Upstream {
			status: raw.status,
			body: raw.body,
		});
	}
	Ok(ProxyResponse::new(raw.status, raw.body))
}

/// Extracts `<id>` from a `Location` ending in `/session/<id>`. Accepts both
/// absolute and path-only locations.
pub fn session_id_from_location(location: &str) -> Option<String> {
	let url = Url::parse(location)
		.or_else(|_| Url::parse("http://localhost/").and_then(|base| base.join(location)))
		.ok()?;
	let mut segments = url.path_segments()?.rev().filter(|s| !s.is_empty());
	let id = segments.next()?;
	(segments.next()? == "session").then(|| id.to_string())
}

fn join_url(base_url: &str, path: &str) -> String {
	format!("{}{}", base_url.trim_end_matches('/'), path)
}

fn forwardable(headers: &HeaderMap, has_body: bool) -> HeaderMap {
	let mut out = HeaderMap::with_capacity(headers.len());
	for (name, value) in headers {
		if !HOP_HEADERS.contains(name) {
			out.append(name.clone(), value.clone());
		}
	}
	if has_body && !out.contains_key(header::CONTENT_TYPE) {
		out.insert(
			header::CONTENT_TYPE,
			HeaderValue::from_static("application/json;charset=utf-8"),
		);
	}
	out
}
