use std::path::PathBuf;

use clap::Parser;

/// Command line of the `wdproxy` server.
///
/// Every flag overrides the matching key of the `--config` file.
#[derive(Parser, Debug, Default)]
#[command(name = "wdproxy")]
#[command(about = "WebDriver proxy that runs every browser session in its own container")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// TOML configuration file.
	#[arg(short, long, env = "WDPROXY_CONFIG", value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Address to listen on.
	#[arg(long, env = "WDPROXY_HOST", value_name = "ADDR")]
	pub host: Option<String>,

	/// Port to listen on.
	#[arg(short, long, env = "WDPROXY_PORT")]
	pub port: Option<u16>,

	/// Path prefix of the WebDriver endpoint (e.g. /wd/hub).
	#[arg(long, env = "WDPROXY_CONTEXT_PATH", value_name = "PATH")]
	pub context_path: Option<String>,

	/// Path of the session observer WebSocket.
	#[arg(long, env = "WDPROXY_WS_PATH", value_name = "PATH")]
	pub ws_path: Option<String>,

	/// Per-attempt timeout of the create-session call.
	#[arg(long, env = "WDPROXY_CREATE_TIMEOUT", value_name = "SECS")]
	pub create_timeout: Option<u64>,

	/// Timeout of every other relayed command.
	#[arg(long, env = "WDPROXY_COMMAND_TIMEOUT", value_name = "SECS")]
	pub command_timeout: Option<u64>,

	/// Extra create attempts on a fresh container.
	#[arg(long, env = "WDPROXY_CREATE_RETRIES", value_name = "N")]
	pub create_retries: Option<u32>,

	/// Idle time before a non-interactive session is torn down.
	#[arg(long, env = "WDPROXY_INACTIVITY_TIMEOUT", value_name = "SECS")]
	pub inactivity_timeout: Option<u64>,

	/// Address at which published container ports are reachable.
	#[arg(long, env = "WDPROXY_HOST_ADDRESS", value_name = "ADDR")]
	pub host_address: Option<String>,

	/// Host folder receiving recordings and their metadata.
	#[arg(long, env = "WDPROXY_REGISTRY_FOLDER", value_name = "DIR")]
	pub registry_folder: Option<PathBuf>,

	/// Docker-compatible client executable.
	#[arg(long, env = "WDPROXY_DOCKER", value_name = "PROGRAM")]
	pub docker: Option<String>,
}
