use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use erp_relay::relay::Relay;
use erp_relay::upstream::UpstreamConfig;
use erp_relay_server::{cli::Cli, logging, routes};
use tracing::{error, info};

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	let config = UpstreamConfig {
		base_url: cli.upstream.clone(),
		timeout: Duration::from_secs(cli.upstream_timeout),
	};
	let app = routes::router(Arc::new(Relay::new(config)));

	info!(target = "relay", bind = %cli.bind, upstream = %cli.upstream, "starting erp-relay");
	let listener = match tokio::net::TcpListener::bind(cli.bind).await {
		Ok(listener) => listener,
		Err(err) => {
			error!(target = "relay", bind = %cli.bind, error = %err, "failed to bind listener");
			std::process::exit(1);
		}
	};

	if let Err(err) = axum::serve(listener, app).await {
		error!(target = "relay", error = %err, "server exited");
		std::process::exit(1);
	}
}
