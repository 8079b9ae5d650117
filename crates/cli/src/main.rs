use anyhow::Result;
use clap::Parser;
use wdproxy_cli::cli::Cli;
use wdproxy_cli::config::AppConfig;
use wdproxy_cli::{logging, server};

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	let config = AppConfig::load(&cli)?;
	server::serve(config).await
}
