//! Provisioning coordinator.
//!
//! Turns parsed capabilities into a running, reachable browser container.
//! The container runtime itself is a collaborator behind [`ContainerRuntime`];
//! this module only decides what to start and waits for it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::capabilities::Capabilities;
use crate::config::ProvisionConfig;
use crate::error::{Error, Result};
use crate::record::{Containers, Environment, now_ts};

/// Host-to-container TCP port publication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortBinding {
	pub host: u16,
	pub container: u16,
}

/// Host path mounted into the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bind {
	pub host_path: String,
	pub container_path: String,
}

/// Everything needed to start one browser container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
	pub name: String,
	pub image: String,
	pub ports: Vec<PortBinding>,
	pub volumes: Vec<String>,
	pub binds: Vec<Bind>,
	/// `KEY=value` pairs.
	pub env: Vec<String>,
	/// Shared memory size in bytes.
	pub shm_size: Option<u64>,
	pub network: Option<String>,
}

/// Container lifecycle collaborator.
///
/// Every call may block for a while and may fail; failures should be
/// reported as [`Error::ProvisioningFailed`].
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
	/// Starts a container and returns its handle (the container name).
	async fn start(&self, spec: &ContainerSpec) -> Result<String>;

	/// Stops and removes a container.
	async fn stop(&self, container: &str) -> Result<()>;

	/// Polls `url` until it answers or `timeout` elapses.
	async fn wait_reachable(&self, url: &str, timeout: Duration) -> Result<()>;

	/// Returns a currently free host port.
	fn allocate_port(&self) -> Result<u16>;

	/// Address at which published ports are reachable from this process.
	fn host_address(&self) -> String;
}

/// Host ports allocated for one environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HostPorts {
	hub: u16,
	vnc: u16,
	novnc: u16,
}

/// Stops a started container unless disarmed.
///
/// Covers both a failed reachability wait and the provisioning future being
/// dropped mid-wait (request task aborted).
struct StartedContainer {
	runtime: Arc<dyn ContainerRuntime>,
	name: Option<String>,
}

impl StartedContainer {
	fn new(runtime: Arc<dyn ContainerRuntime>, name: String) -> Self {
		Self {
			runtime,
			name: Some(name),
		}
	}

	fn name(&self) -> &str {
		self.name.as_deref().unwrap_or_default()
	}

	fn disarm(mut self) -> String {
		self.name.take().unwrap_or_default()
	}
}

impl Drop for StartedContainer {
	fn drop(&mut self) {
		let Some(name) = self.name.take() else {
			return;
		};
		let Ok(handle) = tokio::runtime::Handle::try_current() else {
			warn!(target: "wdproxy.provision", container = %name, "no runtime to stop abandoned container");
			return;
		};
		let runtime = Arc::clone(&self.runtime);
		handle.spawn(async move {
			debug!(target: "wdproxy.provision", container = %name, "stopping abandoned container");
			if let Err(err) = runtime.stop(&name).await {
				warn!(target: "wdproxy.provision", container = %name, error = %err, "failed to stop abandoned container");
			}
		});
	}
}

/// Resolves images, starts containers and waits for them to come up.
pub struct Provisioner {
	runtime: Arc<dyn ContainerRuntime>,
	config: ProvisionConfig,
}

impl Provisioner {
	pub fn new(runtime: Arc<dyn ContainerRuntime>, config: ProvisionConfig) -> Self {
		Self { runtime, config }
	}

	pub fn config(&self) -> &ProvisionConfig {
		&self.config
	}

	/// Maps capabilities onto an image reference. Returns `(family, image)`.
	pub fn resolve_image(&self, caps: &Capabilities) -> (String, String) {
		let family = browser_family(caps.browser_name());
		let version = caps
			.version()
			.filter(|v| !v.is_empty())
			.unwrap_or(&self.config.default_version);
		let image = self
			.config
			.image_template
			.replace("{browser}", &family)
			.replace("{version}", version);
		(family, image)
	}

	/// Starts a fresh environment for `caps` and waits until both the
	/// WebDriver endpoint and the visual-stream proxy answer.
	///
	/// On failure no container is left running.
	pub async fn provision(&self, caps: &Capabilities) -> Result<Environment> {
		let (family, image) = self.resolve_image(caps);
		info!(target: "wdproxy.provision", %image, browser = %family, platform = caps.platform().unwrap_or("ANY"), "using image");

		let ports = self.allocate_ports().map_err(as_provisioning)?;
		let spec = self.container_spec(&image, ports);

		let container = self.runtime.start(&spec).await.map_err(as_provisioning)?;
		let started = StartedContainer::new(Arc::clone(&self.runtime), container);

		let host = self.runtime.host_address();
		let hub_url = format!("http://{host}:{}{}", ports.hub, self.config.hub_path);
		self.runtime
			.wait_reachable(&hub_url, self.config.reachable_timeout())
			.await
			.map_err(as_provisioning)?;
		debug!(target: "wdproxy.provision", container = started.name(), %hub_url, "hub reachable");

		let vnc_url = self.vnc_url(&self.public_host(&host), ports.novnc);
		self.runtime
			.wait_reachable(&vnc_url, self.config.reachable_timeout())
			.await
			.map_err(as_provisioning)?;

		let container = started.disarm();
		Ok(Environment {
			hub_url,
			vnc_url,
			containers: Containers::single(container),
			browser: family,
			version: image_version(&image).to_string(),
			created_at: now_ts(),
			manual_recording: caps.manual_recording(),
			correlation_id: caps.correlation_id().map(str::to_owned),
		})
	}

	/// Stops every container of an environment. Failures are logged, not raised.
	pub async fn release(&self, environment: &Environment) {
		for container in environment.containers.distinct() {
			debug!(target: "wdproxy.provision", container, "releasing container");
			if let Err(err) = self.runtime.stop(container).await {
				warn!(target: "wdproxy.provision", container, error = %err, "failed to release container");
			}
		}
	}

	fn allocate_ports(&self) -> Result<HostPorts> {
		const MAX_DRAWS: usize = 16;
		let mut taken: Vec<u16> = Vec::with_capacity(3);
		for _ in 0..MAX_DRAWS {
			let port = self.runtime.allocate_port()?;
			if !taken.contains(&port) {
				taken.push(port);
			}
			if taken.len() == 3 {
				return Ok(HostPorts {
					hub: taken[0],
					vnc: taken[1],
					novnc: taken[2],
				});
			}
		}
		Err(Error::ProvisioningFailed(format!(
			"could not allocate three distinct ports in {MAX_DRAWS} draws"
		)))
	}

	fn container_spec(&self, image: &str, ports: HostPorts) -> ContainerSpec {
		let cfg = &self.config;
		ContainerSpec {
			name: format!("{}{}", cfg.container_prefix, Uuid::new_v4().simple()),
			image: image.to_string(),
			ports: vec![
				PortBinding {
					host: ports.hub,
					container: cfg.hub_port,
				},
				PortBinding {
					host: ports.vnc,
					container: cfg.vnc_port,
				},
				PortBinding {
					host: ports.novnc,
					container: cfg.novnc_port,
				},
			],
			volumes: vec![cfg.recording_folder.clone()],
			binds: vec![Bind {
				host_path: cfg.registry_folder.clone(),
				container_path: cfg.recording_folder.clone(),
			}],
			env: vec![
				format!("SCREEN_RESOLUTION={}", cfg.screen_resolution),
				format!("TZ={}", cfg.timezone),
			],
			shm_size: Some(cfg.shm_size).filter(|s| *s > 0),
			network: cfg.network.clone(),
		}
	}

	/// Externally reachable host: the configured environment variable wins
	/// unless it is unset or `localhost`.
	fn public_host(&self, host: &str) -> String {
		match std::env::var(&self.config.public_host_env) {
			Ok(public) if !public.is_empty() && !public.eq_ignore_ascii_case("localhost") => public,
			_ => host.to_string(),
		}
	}

	fn vnc_url(&self, host: &str, port: u16) -> String {
		self.config
			.vnc_url_template
			.replace("{host}", host)
			.replace("{port}", &port.to_string())
			.replace("{password}", &self.config.vnc_password)
	}
}

/// Image family for a browser name; Blink-based Opera ships as `opera`.
fn browser_family(browser: &str) -> String {
	if browser.eq_ignore_ascii_case("operablink") {
		"opera".to_string()
	} else {
		browser.to_ascii_lowercase()
	}
}

/// Tag portion of an image reference, `latest` when untagged.
fn image_version(image: &str) -> &str {
	let name = image.rsplit('/').next().unwrap_or(image);
	match name.split_once(':') {
		Some((_, tag)) if !tag.is_empty() => tag,
		_ => "latest",
	}
}

fn as_provisioning(err: Error) -> Error {
	match err {
		Error::ProvisioningFailed(_) => err,
		other => Error::ProvisioningFailed(other.to_string()),
	}
}
