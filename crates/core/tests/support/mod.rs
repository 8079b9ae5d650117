//! Test doubles: an in-process browser hub and counting collaborators.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use serde_json::{Value, json};
use wdproxy::{
	Config, ContainerRuntime, ContainerSpec, Error, Orchestrator, Recorder, Result, SessionObserver, SessionRecord,
};

pub fn init_tracing() {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// How the mock hub answers the create call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateShape {
	Flat,
	Nested,
	Redirect,
	Failure,
}

/// How the mock hub answers the two maximize endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Maximize {
	/// `window/current/maximize` is 404, `window/maximize` succeeds.
	FallbackOnly,
	/// Both endpoints are 404.
	Broken,
	/// `window/current/maximize` never answers in time.
	Hanging,
}

pub struct MockHub {
	shape: CreateShape,
	maximize: Maximize,
	next_id: AtomicUsize,
	pub creates: AtomicUsize,
	pub maximize_current: AtomicUsize,
	pub maximize_plain: AtomicUsize,
	pub deletes: AtomicUsize,
	pub commands: AtomicUsize,
	pub last_create: Mutex<Option<Value>>,
}

impl MockHub {
	pub fn last_create(&self) -> Value {
		self.last_create.lock().unwrap().clone().expect("no create received")
	}
}

/// Starts a hub on an ephemeral port. Returns its state and port.
pub async fn spawn_hub(shape: CreateShape) -> (Arc<MockHub>, u16) {
	spawn_hub_with(shape, Maximize::FallbackOnly).await
}

pub async fn spawn_hub_with(shape: CreateShape, maximize: Maximize) -> (Arc<MockHub>, u16) {
	let hub = Arc::new(MockHub {
		shape,
		maximize,
		next_id: AtomicUsize::new(1),
		creates: AtomicUsize::new(0),
		maximize_current: AtomicUsize::new(0),
		maximize_plain: AtomicUsize::new(0),
		deletes: AtomicUsize::new(0),
		commands: AtomicUsize::new(0),
		last_create: Mutex::new(None),
	});

	let app = Router::new()
		.route("/wd/hub/session", post(create))
		.route("/wd/hub/session/{id}", delete(delete_session))
		.route("/wd/hub/session/{id}/window/current/maximize", post(maximize_current))
		.route("/wd/hub/session/{id}/window/maximize", post(maximize_plain))
		.route("/wd/hub/session/{id}/url", get(current_url).post(navigate))
		.route("/wd/hub/session/{id}/cookie/{name}", delete(delete_cookie))
		.with_state(Arc::clone(&hub));

	let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
	let port = listener.local_addr().unwrap().port();
	tokio::spawn(async move {
		axum::serve(listener, app).await.unwrap();
	});
	(hub, port)
}

/// A port nothing listens on.
pub fn closed_port() -> u16 {
	let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
	listener.local_addr().unwrap().port()
}

async fn create(State(hub): State<Arc<MockHub>>, body: String) -> Response {
	hub.creates.fetch_add(1, Ordering::SeqCst);
	*hub.last_create.lock().unwrap() = serde_json::from_str(&body).ok();
	let id = format!("session-{}", hub.next_id.fetch_add(1, Ordering::SeqCst));
	match hub.shape {
		CreateShape::Flat => axum::Json(json!({
			"sessionId": id,
			"status": 0,
			"value": {"browserName": "chrome", "platform": "LINUX"}
		}))
		.into_response(),
		CreateShape::Nested => axum::Json(json!({
			"value": {"sessionId": id, "capabilities": {"browserName": "chrome"}}
		}))
		.into_response(),
		CreateShape::Redirect => {
			(StatusCode::FOUND, [(header::LOCATION, format!("/wd/hub/session/{id}"))]).into_response()
		}
		CreateShape::Failure => (
			StatusCode::INTERNAL_SERVER_ERROR,
			axum::Json(json!({"value": {"error": "session not created", "message": "chrome crashed"}})),
		)
			.into_response(),
	}
}

async fn delete_session(State(hub): State<Arc<MockHub>>, Path(_id): Path<String>) -> axum::Json<Value> {
	hub.deletes.fetch_add(1, Ordering::SeqCst);
	axum::Json(json!({"value": null}))
}

async fn maximize_current(State(hub): State<Arc<MockHub>>) -> StatusCode {
	hub.maximize_current.fetch_add(1, Ordering::SeqCst);
	if hub.maximize == Maximize::Hanging {
		tokio::time::sleep(Duration::from_secs(30)).await;
	}
	StatusCode::NOT_FOUND
}

async fn maximize_plain(State(hub): State<Arc<MockHub>>) -> Response {
	hub.maximize_plain.fetch_add(1, Ordering::SeqCst);
	match hub.maximize {
		Maximize::Broken => StatusCode::NOT_FOUND.into_response(),
		Maximize::FallbackOnly | Maximize::Hanging => axum::Json(json!({"value": null})).into_response(),
	}
}

async fn current_url(State(hub): State<Arc<MockHub>>) -> axum::Json<Value> {
	hub.commands.fetch_add(1, Ordering::SeqCst);
	axum::Json(json!({"value": {"url": "https://example.org/"}}))
}

async fn navigate(State(hub): State<Arc<MockHub>>) -> axum::Json<Value> {
	hub.commands.fetch_add(1, Ordering::SeqCst);
	axum::Json(json!({"value": null}))
}

async fn delete_cookie(State(hub): State<Arc<MockHub>>) -> axum::Json<Value> {
	hub.commands.fetch_add(1, Ordering::SeqCst);
	axum::Json(json!({"value": null}))
}

/// Container runtime that starts nothing. Port draws cycle through
/// `[hub_port, 40001, 40002]`, so every environment's WebDriver endpoint is
/// `hub_port`.
pub struct FakeRuntime {
	ports: [u16; 3],
	draws: AtomicUsize,
	pub starts: AtomicUsize,
	pub stops: AtomicUsize,
	pub stopped: Mutex<Vec<String>>,
	pub specs: Mutex<Vec<ContainerSpec>>,
	pub fail_starts: AtomicBool,
}

impl FakeRuntime {
	pub fn new(hub_port: u16) -> Arc<Self> {
		Arc::new(Self {
			ports: [hub_port, 40001, 40002],
			draws: AtomicUsize::new(0),
			starts: AtomicUsize::new(0),
			stops: AtomicUsize::new(0),
			stopped: Mutex::new(Vec::new()),
			specs: Mutex::new(Vec::new()),
			fail_starts: AtomicBool::new(false),
		})
	}

	pub fn starts(&self) -> usize {
		self.starts.load(Ordering::SeqCst)
	}

	pub fn stops(&self) -> usize {
		self.stops.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
	async fn start(&self, spec: &ContainerSpec) -> Result<String> {
		self.starts.fetch_add(1, Ordering::SeqCst);
		if self.fail_starts.load(Ordering::SeqCst) {
			return Err(Error::ProvisioningFailed("docker daemon unavailable".into()));
		}
		self.specs.lock().unwrap().push(spec.clone());
		Ok(spec.name.clone())
	}

	async fn stop(&self, container: &str) -> Result<()> {
		self.stops.fetch_add(1, Ordering::SeqCst);
		self.stopped.lock().unwrap().push(container.to_string());
		Ok(())
	}

	async fn wait_reachable(&self, _url: &str, _timeout: Duration) -> Result<()> {
		Ok(())
	}

	fn allocate_port(&self) -> Result<u16> {
		let n = self.draws.fetch_add(1, Ordering::SeqCst);
		Ok(self.ports[n % self.ports.len()])
	}

	fn host_address(&self) -> String {
		"127.0.0.1".into()
	}
}

#[derive(Default)]
pub struct FakeRecorder {
	pub starts: AtomicUsize,
	pub stops: AtomicUsize,
	pub persists: AtomicUsize,
	pub fail_start: AtomicBool,
	pub fail_stop: AtomicBool,
}

#[async_trait]
impl Recorder for FakeRecorder {
	async fn start(&self, _record: &SessionRecord) -> Result<()> {
		self.starts.fetch_add(1, Ordering::SeqCst);
		if self.fail_start.load(Ordering::SeqCst) {
			return Err(Error::Io(std::io::Error::other("recording script missing")));
		}
		Ok(())
	}

	async fn stop(&self, _record: &SessionRecord) -> Result<()> {
		self.stops.fetch_add(1, Ordering::SeqCst);
		// widen the race window for concurrent teardown tests
		tokio::time::sleep(Duration::from_millis(20)).await;
		if self.fail_stop.load(Ordering::SeqCst) {
			return Err(Error::Io(std::io::Error::other("recorder gone")));
		}
		Ok(())
	}

	async fn persist_metadata(&self, _record: &SessionRecord) -> Result<()> {
		self.persists.fetch_add(1, Ordering::SeqCst);
		Ok(())
	}
}

pub struct FakeObserver {
	pub active: AtomicBool,
	pub created: AtomicUsize,
	pub removed: AtomicUsize,
	pub recorded: AtomicUsize,
}

impl FakeObserver {
	pub fn new(active: bool) -> Arc<Self> {
		Arc::new(Self {
			active: AtomicBool::new(active),
			created: AtomicUsize::new(0),
			removed: AtomicUsize::new(0),
			recorded: AtomicUsize::new(0),
		})
	}
}

impl SessionObserver for FakeObserver {
	fn session_created(&self, _record: &SessionRecord) {
		self.created.fetch_add(1, Ordering::SeqCst);
	}

	fn session_removed(&self, _record: &SessionRecord) {
		self.removed.fetch_add(1, Ordering::SeqCst);
	}

	fn recording_ready(&self, _record: &SessionRecord) {
		self.recorded.fetch_add(1, Ordering::SeqCst);
	}

	fn has_active_observers(&self) -> bool {
		self.active.load(Ordering::SeqCst)
	}
}

/// Orchestrator wired to fakes, plus handles on each fake.
pub struct Harness {
	pub orchestrator: Orchestrator,
	pub runtime: Arc<FakeRuntime>,
	pub recorder: Arc<FakeRecorder>,
	pub observer: Arc<FakeObserver>,
}

pub fn test_config() -> Config {
	Config {
		create_timeout: 5,
		command_timeout: 5,
		create_retries: 2,
		..Config::default()
	}
}

pub fn harness(hub_port: u16, config: Config) -> Harness {
	init_tracing();
	let runtime = FakeRuntime::new(hub_port);
	let recorder = Arc::new(FakeRecorder::default());
	let observer = FakeObserver::new(true);
	let orchestrator = Orchestrator::new(
		config,
		Arc::clone(&runtime) as Arc<dyn ContainerRuntime>,
		Arc::clone(&observer) as Arc<dyn SessionObserver>,
		Arc::clone(&recorder) as Arc<dyn Recorder>,
	)
	.unwrap();
	Harness {
		orchestrator,
		runtime,
		recorder,
		observer,
	}
}

pub fn load(counter: &AtomicUsize) -> usize {
	counter.load(Ordering::SeqCst)
}
