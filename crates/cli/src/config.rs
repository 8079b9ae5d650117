//! Server configuration: an optional TOML file plus command-line overrides.
//!
//! ```toml
//! [server]
//! port = 8040
//! context_path = "/wd/hub"
//!
//! [session]
//! create_retries = 3
//! inactivity_timeout = 90
//!
//! [session.provision]
//! image_template = "elastestbrowsers/{browser}:{version}"
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::Cli;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
	pub server: ServerConfig,
	/// Engine settings, passed to the orchestrator as-is.
	pub session: wdproxy::Config,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
	pub host: String,
	pub port: u16,
	/// WebDriver endpoint prefix.
	pub context_path: String,
	/// Observer WebSocket path.
	pub ws_path: String,
	/// Docker-compatible client executable.
	pub docker: String,
}

impl Default for ServerConfig {
	fn default() -> Self {
		Self {
			host: "0.0.0.0".to_string(),
			port: 8040,
			context_path: "/wd/hub".to_string(),
			ws_path: "/ws".to_string(),
			docker: "docker".to_string(),
		}
	}
}

impl AppConfig {
	/// Reads a TOML file. Missing keys keep their defaults.
	pub fn from_file(path: &Path) -> Result<Self> {
		let text = std::fs::read_to_string(path)
			.with_context(|| format!("Failed to read config file: {}", path.display()))?;
		toml::from_str(&text).with_context(|| format!("Invalid config file: {}", path.display()))
	}

	/// Loads `--config` if given, then applies the remaining flags.
	pub fn load(cli: &Cli) -> Result<Self> {
		let mut config = match &cli.config {
			Some(path) => Self::from_file(path)?,
			None => Self::default(),
		};
		config.apply(cli);
		Ok(config)
	}

	pub fn apply(&mut self, cli: &Cli) {
		let server = &mut self.server;
		let session = &mut self.session;
		if let Some(host) = &cli.host {
			server.host = host.clone();
		}
		if let Some(port) = cli.port {
			server.port = port;
		}
		if let Some(path) = &cli.context_path {
			server.context_path = path.clone();
		}
		if let Some(path) = &cli.ws_path {
			server.ws_path = path.clone();
		}
		if let Some(docker) = &cli.docker {
			server.docker = docker.clone();
		}
		if let Some(secs) = cli.create_timeout {
			session.create_timeout = secs;
		}
		if let Some(secs) = cli.command_timeout {
			session.command_timeout = secs;
		}
		if let Some(retries) = cli.create_retries {
			session.create_retries = retries;
		}
		if let Some(secs) = cli.inactivity_timeout {
			session.inactivity_timeout = secs;
		}
		if let Some(addr) = &cli.host_address {
			session.provision.host_address = addr.clone();
		}
		if let Some(dir) = &cli.registry_folder {
			session.provision.registry_folder = dir.display().to_string();
		}
	}
}

/// `/wd/hub/` → `/wd/hub`, `/` → ``, `wd/hub` → `/wd/hub`.
pub fn normalize_prefix(path: &str) -> String {
	let trimmed = path.trim_matches('/');
	if trimmed.is_empty() {
		String::new()
	} else {
		format!("/{trimmed}")
	}
}

#[cfg(test)]
mod tests {
	use std::io::Write;

	use super::*;

	#[test]
	fn file_values_then_flag_overrides() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(
			file,
			r#"
[server]
port = 9000
context_path = "/grid"

[session]
create_retries = 7
inactivity_timeout = 300

[session.provision]
default_version = "beta"
"#
		)
		.unwrap();

		let cli = Cli {
			config: Some(file.path().to_path_buf()),
			port: Some(9100),
			inactivity_timeout: Some(30),
			..Cli::default()
		};
		let config = AppConfig::load(&cli).unwrap();

		assert_eq!(config.server.port, 9100);
		assert_eq!(config.server.context_path, "/grid");
		assert_eq!(config.server.ws_path, "/ws");
		assert_eq!(config.session.create_retries, 7);
		assert_eq!(config.session.inactivity_timeout, 30);
		assert_eq!(config.session.provision.default_version, "beta");
		assert_eq!(config.session.provision.hub_port, 4444);
	}

	#[test]
	fn invalid_file_is_reported_with_path() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "[server]\nport = \"high\"").unwrap();
		let err = AppConfig::from_file(file.path()).unwrap_err();
		assert!(format!("{err:#}").contains("Invalid config file"));
	}

	#[test]
	fn prefixes_are_normalized() {
		assert_eq!(normalize_prefix("/wd/hub/"), "/wd/hub");
		assert_eq!(normalize_prefix("wd/hub"), "/wd/hub");
		assert_eq!(normalize_prefix("/"), "");
	}
}
