//! Request orchestrator.
//!
//! Classifies each inbound WebDriver request and drives it through one of
//! two flows:
//!
//! - **create**: parse and rewrite capabilities, provision a fresh browser
//!   environment, relay the create call, and retry on a new environment when
//!   the hub cannot be reached. A confirmed session is registered, announced
//!   to observers, maximized, recorded and given an inactivity timer.
//! - **proxy**: resolve the session from the path and relay the command to
//!   its hub. An exact `DELETE /session/<id>` tears the session down once the
//!   hub has answered.
//!
//! Teardown is gated by registry removal: whichever caller removes the record
//! (explicit delete, inactivity timer, shutdown drain) runs the destructive
//! steps; everyone else observes the session as gone.

use std::sync::{Arc, Weak};

use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use wdproxy_protocol::{NewSessionResponse, StatusBody};

use crate::capabilities::Capabilities;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::exchange::{Exchange, ProxyRequest, ProxyResponse};
use crate::observer::SessionObserver;
use crate::provision::{ContainerRuntime, Provisioner};
use crate::record::{Environment, SessionRecord};
use crate::recording::Recorder;
use crate::registry::SessionRegistry;
use crate::rewrite::{CapabilityRewriter, walk_objects};
use crate::route::{Route, classify};
use crate::timer::InactivityTimers;

/// Response key naming the container that served a request.
pub const HUB_CONTAINER_KEY: &str = "hubContainerName";

/// What started a teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
	/// Exact `DELETE /session/<id>` relayed successfully.
	Delete,
	/// Inactivity timer fired.
	Timeout,
	/// Process shutdown drain.
	Shutdown,
}

/// Top-level session engine. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Orchestrator {
	inner: Arc<Inner>,
}

struct Inner {
	config: Config,
	registry: SessionRegistry,
	timers: InactivityTimers,
	provisioner: Provisioner,
	exchange: Exchange,
	rewriter: CapabilityRewriter,
	observers: Arc<dyn SessionObserver>,
	recorder: Arc<dyn Recorder>,
}

impl Orchestrator {
	pub fn new(
		config: Config,
		runtime: Arc<dyn ContainerRuntime>,
		observers: Arc<dyn SessionObserver>,
		recorder: Arc<dyn Recorder>,
	) -> Result<Self> {
		let exchange = Exchange::new(config.create_timeout(), config.command_timeout())?;
		let provisioner = Provisioner::new(runtime, config.provision.clone());
		Ok(Self {
			inner: Arc::new(Inner {
				config,
				registry: SessionRegistry::new(),
				timers: InactivityTimers::new(),
				provisioner,
				exchange,
				rewriter: CapabilityRewriter::default(),
				observers,
				recorder,
			}),
		})
	}

	pub fn config(&self) -> &Config {
		&self.inner.config
	}

	pub fn registry(&self) -> &SessionRegistry {
		&self.inner.registry
	}

	pub fn timers(&self) -> &InactivityTimers {
		&self.inner.timers
	}

	/// Handles one inbound request addressed to the WebDriver context.
	pub async fn handle(&self, request: ProxyRequest) -> Result<ProxyResponse> {
		let route = classify(&request.method, &request.path, &self.inner.config.session_marker);
		debug!(
			target: "wdproxy.session",
			method = %request.method,
			path = %request.path,
			session = route.session_id().unwrap_or("-"),
			?route,
			"classified request"
		);
		match route {
			Route::CreateSession => self.create_session(request).await,
			Route::Unmatched => Err(Error::UnknownSession(request.path)),
			Route::DeleteSession(id) => self.proxy(&id, request, true).await,
			Route::Command(id) => self.proxy(&id, request, false).await,
		}
	}

	async fn create_session(&self, request: ProxyRequest) -> Result<ProxyResponse> {
		let inner = &self.inner;
		let (original, caps) = Capabilities::parse_body(&request.body)?;
		let rewritten = inner.rewriter.rewrite(&original, &caps);
		let forwarded = inner.rewriter.forwarded(&rewritten, &caps);
		info!(
			target: "wdproxy.session",
			browser = caps.browser_name(),
			version = caps.version().unwrap_or(""),
			live = caps.live(),
			manual_recording = caps.manual_recording(),
			"new session requested"
		);

		let outgoing = ProxyRequest {
			body: forwarded.to_string(),
			..request
		};
		let retries = inner.config.create_retries;

		for attempt in 0..=retries {
			let environment = match inner.provisioner.provision(&caps).await {
				Ok(environment) => PendingEnvironment::new(Arc::clone(inner), environment),
				Err(err) => {
					warn!(target: "wdproxy.session", attempt, error = %err, "provisioning attempt failed");
					continue;
				}
			};

			let outcome = inner.exchange.create(&environment.get().hub_url, &outgoing).await;
			match outcome {
				Ok(Some(response)) => return self.register(environment, &caps, response).await,
				Ok(None) => {
					warn!(
						target: "wdproxy.session",
						attempt,
						hub = %environment.get().hub_url,
						"browser unreachable during create; retrying on a fresh environment"
					);
					environment.dispose().await;
				}
				Err(err) => {
					environment.dispose().await;
					return Err(err);
				}
			}
		}

		Err(Error::FatalProvisioning { retries })
	}

	/// Promotes a confirmed environment into a registered session and runs
	/// the post-create side effects.
	async fn register(
		&self,
		environment: PendingEnvironment,
		caps: &Capabilities,
		response: ProxyResponse,
	) -> Result<ProxyResponse> {
		let inner = &self.inner;
		let session_id = response
			.json()
			.and_then(|doc| serde_json::from_value::<NewSessionResponse>(doc).ok())
			.and_then(|parsed| parsed.session_id().map(str::to_owned));
		let Some(session_id) = session_id else {
			environment.dispose().await;
			return Err(Error::InvalidSessionResponse(response.body));
		};

		let record = Arc::new(environment.disarm().into_session(
			session_id,
			caps.live(),
			inner.config.inactivity_timeout(),
		));
		if let Some(previous) = inner.registry.insert(Arc::clone(&record)) {
			warn!(target: "wdproxy.session", session = %previous.session_id, "hub reused a live session id");
		}
		info!(
			target: "wdproxy.session",
			session = %record.session_id,
			container = record.hub_container(),
			browser = %record.environment.browser,
			version = %record.environment.version,
			"session created"
		);

		if !record.interactive && inner.observers.has_active_observers() {
			inner.observers.session_created(&record);
		}

		// The session is registered from here on. Side effects run on their
		// own task so a dropped request still ends with the timer armed.
		let orchestrator = self.clone();
		let settled = Arc::clone(&record);
		if let Err(err) = tokio::spawn(async move { orchestrator.settle(&settled).await }).await {
			warn!(target: "wdproxy.session", session = %record.session_id, error = %err, "post-create task failed");
		}

		Ok(ProxyResponse::new(
			response.status,
			inject_container(&response.body, record.hub_container()),
		))
	}

	/// Maximize, recording start and timer. Failures here never fail the
	/// create response.
	async fn settle(&self, record: &SessionRecord) {
		self.maximize(record).await;

		if !record.environment.manual_recording {
			if let Err(err) = self.inner.recorder.start(record).await {
				warn!(target: "wdproxy.session", session = %record.session_id, error = %err, "failed to start recording");
			}
		}

		// a shutdown drain may have removed the session meanwhile
		if !record.interactive && self.inner.registry.contains(&record.session_id) {
			self.arm_timer(record);
		}
	}

	/// Tries both maximize endpoints; the second only if the first fails.
	async fn maximize(&self, record: &SessionRecord) {
		let marker = &self.inner.config.session_marker;
		let id = &record.session_id;
		let attempts = [
			format!("{marker}/{id}/window/current/maximize"),
			format!("{marker}/{id}/window/maximize"),
		];
		for path in attempts {
			let request = ProxyRequest::new(reqwest::Method::POST, path, "{}");
			match self.inner.exchange.command(record.hub_url(), &request).await {
				Ok(_) => return,
				Err(err) => {
					debug!(target: "wdproxy.session", session = %id, path = %request.path, error = %err, "maximize failed");
				}
			}
		}
		warn!(target: "wdproxy.session", session = %id, "could not maximize browser window");
	}

	fn arm_timer(&self, record: &SessionRecord) {
		let weak: Weak<Inner> = Arc::downgrade(&self.inner);
		let session_id = record.session_id.clone();
		self.inner.timers.arm(
			&record.session_id,
			record.expiry_token().clone(),
			record.timeout,
			move || async move {
				let Some(inner) = weak.upgrade() else {
					return;
				};
				let orchestrator = Orchestrator { inner };
				if let Err(err) = orchestrator.teardown(&session_id, Trigger::Timeout).await {
					warn!(target: "wdproxy.timer", session = %session_id, error = %err, "session expired");
				}
			},
		);
	}

	async fn proxy(&self, session_id: &str, request: ProxyRequest, deletes: bool) -> Result<ProxyResponse> {
		let Some(record) = self.inner.registry.get(session_id) else {
			debug!(target: "wdproxy.session", session = session_id, path = %request.path, "no such session");
			return Err(Error::UnknownSession(session_id.to_string()));
		};

		let response = self.inner.exchange.command(record.hub_url(), &request).await?;

		if deletes {
			self.teardown(session_id, Trigger::Delete).await?;
		}

		Ok(ProxyResponse::new(
			response.status,
			inject_container(&response.body, record.hub_container()),
		))
	}

	/// Tears a registered session down.
	///
	/// Returns `Ok(false)` when the session was already gone (another caller
	/// won the race). A [`Trigger::Timeout`] teardown that ran reports
	/// [`Error::SessionTimedOut`] after cleanup completed.
	pub async fn teardown(&self, session_id: &str, trigger: Trigger) -> Result<bool> {
		let Some(record) = self.inner.registry.remove(session_id) else {
			debug!(target: "wdproxy.session", session = session_id, ?trigger, "session already torn down");
			return Ok(false);
		};
		info!(target: "wdproxy.session", session = session_id, ?trigger, "tearing down session");

		// Cleanup runs on its own task so a dropped caller cannot strand the
		// environment half-released.
		let inner = Arc::clone(&self.inner);
		let cleanup_record = Arc::clone(&record);
		if let Err(err) = tokio::spawn(async move { inner.cleanup(&cleanup_record).await }).await {
			warn!(target: "wdproxy.session", session = session_id, error = %err, "teardown task failed");
		}

		self.inner.timers.cancel(session_id);
		record.expiry_token().cancel();

		match trigger {
			Trigger::Timeout => Err(Error::SessionTimedOut {
				session_id: session_id.to_string(),
				timeout: record.timeout,
			}),
			Trigger::Delete | Trigger::Shutdown => Ok(true),
		}
	}

	/// Drains every live session through the regular teardown, then disarms
	/// any timer still pending.
	pub async fn shutdown(&self) {
		let sessions = self.inner.registry.snapshot();
		info!(target: "wdproxy.session", count = sessions.len(), "draining sessions");

		let mut drains = JoinSet::new();
		for record in sessions {
			let orchestrator = self.clone();
			drains.spawn(async move { orchestrator.teardown(&record.session_id, Trigger::Shutdown).await });
		}
		while let Some(joined) = drains.join_next().await {
			match joined {
				Ok(Ok(_)) => {}
				Ok(Err(err)) => warn!(target: "wdproxy.session", error = %err, "teardown during shutdown failed"),
				Err(err) => warn!(target: "wdproxy.session", error = %err, "teardown task panicked"),
			}
		}
		self.inner.timers.cancel_all();
	}

	/// Readiness summary served on `/status`.
	pub fn status(&self) -> StatusBody {
		let live = self.inner.registry.len();
		StatusBody {
			ready: true,
			message: format!("ready; {live} live session(s)"),
			browsers: self.inner.config.provision.browsers.clone(),
		}
	}
}

impl Inner {
	/// Best-effort recording and observer steps, then the unconditional
	/// environment release.
	async fn cleanup(&self, record: &SessionRecord) {
		let session = record.session_id.as_str();
		if let Err(err) = self.recorder.stop(record).await {
			warn!(target: "wdproxy.session", session, error = %err, "failed to stop recording");
		}
		if let Err(err) = self.recorder.persist_metadata(record).await {
			warn!(target: "wdproxy.session", session, error = %err, "failed to persist recording metadata");
		}
		self.observers.recording_ready(record);
		if !record.interactive {
			self.observers.session_removed(record);
		}
		self.provisioner.release(&record.environment).await;
	}
}

/// An environment provisioned for a create attempt that is not yet owned by
/// a registered session. Released in the background if dropped while armed.
struct PendingEnvironment {
	inner: Arc<Inner>,
	environment: Environment,
	armed: bool,
}

impl PendingEnvironment {
	fn new(inner: Arc<Inner>, environment: Environment) -> Self {
		Self {
			inner,
			environment,
			armed: true,
		}
	}

	fn get(&self) -> &Environment {
		&self.environment
	}

	/// Hands ownership over to a session record.
	fn disarm(mut self) -> Environment {
		self.armed = false;
		self.environment.clone()
	}

	/// Releases the environment now. No recording or observer work: the
	/// environment never backed a registered session.
	async fn dispose(mut self) {
		self.armed = false;
		self.inner.provisioner.release(&self.environment).await;
	}
}

impl Drop for PendingEnvironment {
	fn drop(&mut self) {
		if !self.armed {
			return;
		}
		let Ok(handle) = tokio::runtime::Handle::try_current() else {
			warn!(target: "wdproxy.session", hub = %self.environment.hub_url, "no runtime to release abandoned environment");
			return;
		};
		let inner = Arc::clone(&self.inner);
		let environment = self.environment.clone();
		handle.spawn(async move {
			debug!(target: "wdproxy.session", hub = %environment.hub_url, "releasing abandoned environment");
			inner.provisioner.release(&environment).await;
		});
	}
}

/// Sets `hubContainerName` on every JSON object in `body`. Non-JSON bodies
/// are returned unchanged.
pub fn inject_container(body: &str, container: &str) -> String {
	let Ok(mut document) = serde_json::from_str::<Value>(body) else {
		return body.to_string();
	};
	walk_objects(&mut document, &mut |object| {
		// Replaces rather than appends to a value the hub already set.
		object.insert(HUB_CONTAINER_KEY.to_string(), Value::String(container.to_string()));
	});
	document.to_string()
}
