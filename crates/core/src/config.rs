//! Engine configuration.
//!
//! Every field has a default so a partial TOML file (or none at all) yields
//! a usable configuration. Durations are stored as whole seconds.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
	/// Path segment identifying session-lifecycle requests.
	pub session_marker: String,
	/// Per-attempt timeout for the create-session exchange, in seconds.
	pub create_timeout: u64,
	/// Timeout for every other relayed command, in seconds.
	pub command_timeout: u64,
	/// Extra create attempts after the first one fails.
	pub create_retries: u32,
	/// Inactivity timeout for non-interactive sessions, in seconds.
	pub inactivity_timeout: u64,
	pub provision: ProvisionConfig,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			session_marker: "/session".to_string(),
			create_timeout: 120,
			command_timeout: 600,
			create_retries: 3,
			inactivity_timeout: 60,
			provision: ProvisionConfig::default(),
		}
	}
}

impl Config {
	pub fn create_timeout(&self) -> Duration {
		Duration::from_secs(self.create_timeout)
	}

	pub fn command_timeout(&self) -> Duration {
		Duration::from_secs(self.command_timeout)
	}

	pub fn inactivity_timeout(&self) -> Duration {
		Duration::from_secs(self.inactivity_timeout)
	}
}

/// How backing browser containers are built and reached.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
	/// Container name prefix; a random suffix is appended per container.
	pub container_prefix: String,
	/// Image reference with `{browser}` and `{version}` placeholders.
	pub image_template: String,
	/// Version used when the client asks for none.
	pub default_version: String,
	/// Browser families advertised on `/status`.
	pub browsers: Vec<String>,
	/// WebDriver port exposed by the browser image.
	pub hub_port: u16,
	/// Raw VNC port exposed by the browser image.
	pub vnc_port: u16,
	/// noVNC (websocket proxy) port exposed by the browser image.
	pub novnc_port: u16,
	/// Base path of the WebDriver endpoint inside the container.
	pub hub_path: String,
	/// Visual-stream URL template with `{host}`, `{port}` and `{password}` placeholders.
	pub vnc_url_template: String,
	pub vnc_password: String,
	pub screen_resolution: String,
	pub timezone: String,
	/// Shared memory for the browser container, in bytes.
	pub shm_size: u64,
	/// Docker network to attach containers to, if any.
	pub network: Option<String>,
	/// Recording folder inside the container.
	pub recording_folder: String,
	/// Host folder bound onto `recording_folder`.
	pub registry_folder: String,
	/// Upper bound on each reachability wait, in seconds.
	pub reachable_timeout: u64,
	/// Address at which published container ports are reachable from this process.
	pub host_address: String,
	/// Environment variable holding the externally reachable host name.
	pub public_host_env: String,
}

impl Default for ProvisionConfig {
	fn default() -> Self {
		Self {
			container_prefix: "wdproxy-browser-".to_string(),
			image_template: "elastestbrowsers/{browser}:{version}".to_string(),
			default_version: "latest".to_string(),
			browsers: vec!["chrome".to_string(), "firefox".to_string(), "opera".to_string()],
			hub_port: 4444,
			vnc_port: 5900,
			novnc_port: 6080,
			hub_path: "/wd/hub".to_string(),
			vnc_url_template: "http://{host}:{port}/vnc.html?resize=scale&autoconnect=true&password={password}"
				.to_string(),
			vnc_password: "selenoid".to_string(),
			screen_resolution: "1440x1080x24".to_string(),
			timezone: "Europe/Madrid".to_string(),
			shm_size: 2_147_483_648,
			network: None,
			recording_folder: "/home/ubuntu/recordings".to_string(),
			registry_folder: "/tmp/wdproxy/recordings".to_string(),
			reachable_timeout: 30,
			host_address: "127.0.0.1".to_string(),
			public_host_env: "WDPROXY_PUBLIC_HOST".to_string(),
		}
	}
}

impl ProvisionConfig {
	pub fn reachable_timeout(&self) -> Duration {
		Duration::from_secs(self.reachable_timeout)
	}
}
