//! Container runtime backed by the `docker` command-line client.

use std::net::TcpListener;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::Instant;
use tracing::{debug, trace};
use wdproxy::{ContainerRuntime, ContainerSpec};

use crate::error::{Error, Result};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Drives containers through `docker run` / `docker rm -f`.
#[derive(Debug, Clone)]
pub struct DockerCli {
	program: String,
	host_address: String,
	client: reqwest::Client,
	poll_interval: Duration,
}

impl DockerCli {
	/// `host_address` is where published ports are reachable from this process.
	pub fn new(host_address: impl Into<String>) -> Result<Self> {
		let client = reqwest::Client::builder()
			.redirect(reqwest::redirect::Policy::none())
			.build()?;
		Ok(Self {
			program: "docker".to_string(),
			host_address: host_address.into(),
			client,
			poll_interval: DEFAULT_POLL_INTERVAL,
		})
	}

	/// Uses another executable speaking the docker CLI (e.g. `podman`).
	pub fn with_program(mut self, program: impl Into<String>) -> Self {
		self.program = program.into();
		self
	}

	pub fn with_poll_interval(mut self, interval: Duration) -> Self {
		self.poll_interval = interval;
		self
	}

	/// Runs the client with `args` and returns trimmed stdout.
	pub async fn run(&self, args: &[String]) -> Result<String> {
		let command = format!("{} {}", self.program, args.join(" "));
		trace!(target: "wdproxy.docker", %command, "running");

		let output = Command::new(&self.program)
			.args(args)
			.stdin(Stdio::null())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.kill_on_drop(true)
			.output()
			.await
			.map_err(|source| Error::Spawn {
				program: self.program.clone(),
				source,
			})?;

		if !output.status.success() {
			return Err(Error::CommandFailed {
				command,
				status: output.status.code().unwrap_or(-1),
				stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
			});
		}
		Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
	}

	/// `docker exec` inside a running container. `detach` returns as soon
	/// as the process has started.
	pub async fn exec(&self, container: &str, detach: bool, command: &[&str]) -> Result<String> {
		let mut args = vec!["exec".to_string()];
		if detach {
			args.push("-d".to_string());
		}
		args.push(container.to_string());
		args.extend(command.iter().map(|s| s.to_string()));
		self.run(&args).await
	}

	async fn poll_until_reachable(&self, url: &str, timeout: Duration) -> Result<()> {
		let deadline = Instant::now() + timeout;
		let probe_timeout = self.poll_interval.max(Duration::from_secs(1));
		loop {
			match self.client.get(url).timeout(probe_timeout).send().await {
				Ok(response) => {
					debug!(target: "wdproxy.docker", %url, status = %response.status(), "endpoint reachable");
					return Ok(());
				}
				Err(err) => trace!(target: "wdproxy.docker", %url, error = %err, "endpoint not yet reachable"),
			}
			if Instant::now() + self.poll_interval >= deadline {
				return Err(Error::Unreachable {
					url: url.to_string(),
					timeout,
				});
			}
			tokio::time::sleep(self.poll_interval).await;
		}
	}
}

/// Arguments for `docker run` starting `spec` detached.
pub fn run_args(spec: &ContainerSpec) -> Vec<String> {
	let mut args = vec![
		"run".to_string(),
		"-d".to_string(),
		"--name".to_string(),
		spec.name.clone(),
	];
	for port in &spec.ports {
		args.extend(["-p".to_string(), format!("{}:{}", port.host, port.container)]);
	}
	for volume in &spec.volumes {
		args.extend(["-v".to_string(), volume.clone()]);
	}
	for bind in &spec.binds {
		args.extend(["-v".to_string(), format!("{}:{}", bind.host_path, bind.container_path)]);
	}
	for var in &spec.env {
		args.extend(["-e".to_string(), var.clone()]);
	}
	if let Some(size) = spec.shm_size {
		args.extend(["--shm-size".to_string(), size.to_string()]);
	}
	if let Some(network) = &spec.network {
		args.push(format!("--network={network}"));
	}
	args.push(spec.image.clone());
	args
}

#[async_trait]
impl ContainerRuntime for DockerCli {
	async fn start(&self, spec: &ContainerSpec) -> wdproxy::Result<String> {
		debug!(target: "wdproxy.docker", container = %spec.name, image = %spec.image, "starting container");
		let id = self.run(&run_args(spec)).await?;
		trace!(target: "wdproxy.docker", container = %spec.name, %id, "container started");
		Ok(spec.name.clone())
	}

	async fn stop(&self, container: &str) -> wdproxy::Result<()> {
		let args = ["rm".to_string(), "-f".to_string(), container.to_string()];
		match self.run(&args).await {
			Ok(_) => Ok(()),
			Err(Error::CommandFailed { stderr, .. }) if stderr.contains("No such container") => {
				debug!(target: "wdproxy.docker", container, "container already gone");
				Ok(())
			}
			Err(err) => Err(err.into()),
		}
	}

	async fn wait_reachable(&self, url: &str, timeout: Duration) -> wdproxy::Result<()> {
		Ok(self.poll_until_reachable(url, timeout).await?)
	}

	fn allocate_port(&self) -> wdproxy::Result<u16> {
		let listener = TcpListener::bind(("127.0.0.1", 0))?;
		Ok(listener.local_addr()?.port())
	}

	fn host_address(&self) -> String {
		self.host_address.clone()
	}
}
