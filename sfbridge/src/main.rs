use std::process::ExitCode;

use sfbridge::comms::host2dispatch::HostEvent;
use sfbridge::{BridgeConfig, StartupError};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

fn init_tracing() {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	let registry = tracing_subscriber::registry().with(filter).with(fmt::layer());
	#[cfg(feature = "tracy")]
	let registry = registry.with(tracing_tracy::TracyLayer::default());
	let _ = registry.try_init();
}

fn main() -> ExitCode {
	init_tracing();
	match run() {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			tracing::error!("{e}");
			ExitCode::from(e.exit_code())
		}
	}
}

fn run() -> Result<(), StartupError> {
	let config = BridgeConfig::load()?;
	let runtime = tokio::runtime::Builder::new_current_thread()
		.enable_all()
		.build()
		.map_err(StartupError::Runtime)?;
	runtime.block_on(async move {
		let (host_tx, host_rx) = tokio::sync::mpsc::unbounded_channel();
		tokio::spawn(async move {
			if tokio::signal::ctrl_c().await.is_ok() {
				let _ = host_tx.send(HostEvent::Quit);
			}
		});
		sfbridge::bridge::run(config, host_rx).await
	})
}
