//! Command-line flags for the relay server binary.

use std::net::SocketAddr;

use clap::Parser;
use url::Url;

#[derive(Debug, Parser)]
#[command(name = "erp-relay", about = "Scraping relay for the university ERP portal", version)]
pub struct Cli {
	/// Address to bind the HTTP listener on.
	#[arg(long, default_value = "0.0.0.0:8000")]
	pub bind: SocketAddr,

	/// Base URL of the upstream ERP portal.
	#[arg(long, default_value = "https://newerp.kluniversity.in/")]
	pub upstream: Url,

	/// Upstream request timeout in seconds.
	#[arg(long, default_value_t = 30)]
	pub upstream_timeout: u64,

	/// Increase log verbosity (-v debug, -vv trace).
	#[arg(short, long, action = clap::ArgAction::Count)]
	pub verbose: u8,
}
