use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{DefaultBodyLimit, Path, State, WebSocketUpgrade};
use axum::http::{HeaderMap, Method, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use wdproxy::{ContainerRuntime, Orchestrator, ProxyRequest, Recorder, SessionObserver};
use wdproxy_runtime::{ContainerRecorder, DockerCli};

use crate::config::{AppConfig, normalize_prefix};
use crate::error::ApiError;
use crate::hub::ObserverHub;

/// WebDriver file uploads travel as base64 in the body.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
	pub orchestrator: Orchestrator,
	pub hub: Arc<ObserverHub>,
}

/// Routes: `<context>/status`, everything else under `<context>` to the
/// orchestrator, and the observer socket at `ws_path`.
pub fn router(state: AppState, context_path: &str, ws_path: &str) -> Router {
	let context = normalize_prefix(context_path);
	let ws_path = match normalize_prefix(ws_path) {
		path if path.is_empty() => "/ws".to_string(),
		path => path,
	};
	Router::new()
		.route(&format!("{context}/status"), get(status))
		.route(&format!("{context}/{{*rest}}"), any(proxy))
		.route(&ws_path, get(observe))
		.layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
		.with_state(state)
}

async fn status(State(state): State<AppState>) -> impl IntoResponse {
	axum::Json(json!({ "value": state.orchestrator.status() }))
}

async fn proxy(
	State(state): State<AppState>,
	method: Method,
	Path(rest): Path<String>,
	headers: HeaderMap,
	body: String,
) -> Result<Response, ApiError> {
	let request = ProxyRequest::new(method, format!("/{rest}"), body).with_headers(headers);
	let response = state.orchestrator.handle(request).await?;
	Ok((
		response.status,
		[(header::CONTENT_TYPE, "application/json;charset=utf-8")],
		response.body,
	)
		.into_response())
}

async fn observe(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
	ws.on_upgrade(move |socket| async move { state.hub.serve_socket(socket).await })
}

/// Wires the Docker-backed collaborators into an orchestrator.
pub fn build_state(config: &AppConfig) -> Result<AppState> {
	let provision = &config.session.provision;
	let docker = Arc::new(
		DockerCli::new(provision.host_address.clone())
			.context("Failed to initialise container runtime")?
			.with_program(config.server.docker.clone()),
	);
	let hub = Arc::new(ObserverHub::new());
	let recorder = Arc::new(ContainerRecorder::new(Arc::clone(&docker), &provision.registry_folder));

	let orchestrator = Orchestrator::new(
		config.session.clone(),
		docker as Arc<dyn ContainerRuntime>,
		Arc::clone(&hub) as Arc<dyn SessionObserver>,
		recorder as Arc<dyn Recorder>,
	)
	.context("Failed to build session orchestrator")?;

	Ok(AppState { orchestrator, hub })
}

/// Serves until SIGINT/SIGTERM, then drains every live session.
pub async fn serve(config: AppConfig) -> Result<()> {
	let state = build_state(&config)?;
	let app = router(state.clone(), &config.server.context_path, &config.server.ws_path);

	let addr = format!("{}:{}", config.server.host, config.server.port);
	let listener = TcpListener::bind(&addr)
		.await
		.with_context(|| format!("Failed to bind {addr}"))?;
	info!(
		target: "wdproxy.server",
		%addr,
		context = %normalize_prefix(&config.server.context_path),
		ws = %config.server.ws_path,
		"listening"
	);

	axum::serve(listener, app)
		.with_graceful_shutdown(shutdown_signal())
		.await
		.context("Server error")?;

	state.hub.close_all();
	state.orchestrator.shutdown().await;
	info!(target: "wdproxy.server", "shutdown complete");
	Ok(())
}

async fn shutdown_signal() {
	#[cfg(unix)]
	{
		use tokio::signal::unix::{SignalKind, signal};

		match signal(SignalKind::terminate()) {
			Ok(mut sigterm) => {
				tokio::select! {
					_ = sigterm.recv() => info!(target: "wdproxy.server", "received SIGTERM, shutting down"),
					_ = tokio::signal::ctrl_c() => info!(target: "wdproxy.server", "received SIGINT, shutting down"),
				}
			}
			Err(err) => {
				warn!(target: "wdproxy.server", error = %err, "failed to install SIGTERM handler");
				wait_ctrl_c().await;
			}
		}
	}

	#[cfg(not(unix))]
	wait_ctrl_c().await;
}

async fn wait_ctrl_c() {
	match tokio::signal::ctrl_c().await {
		Ok(()) => info!(target: "wdproxy.server", "received Ctrl+C, shutting down"),
		Err(err) => {
			warn!(target: "wdproxy.server", error = %err, "failed to listen for Ctrl+C");
			std::future::pending::<()>().await;
		}
	}
	debug!(target: "wdproxy.server", "shutdown signal handled");
}
