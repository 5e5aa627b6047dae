use std::fs::Permissions;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use crate::channel_layer::Channel;
use crate::comms::host2dispatch::HostEventRx;
use crate::comms::link2dispatch::LinkKind;
use crate::config::BridgeConfig;
use crate::control::ShellControl;
use crate::dispatch_layer::Dispatcher;
use crate::errors::StartupError;
use crate::input_layer::{EvdevWriter, InputSink, NullSink, TouchInjector};
use crate::links::{AppLink, DisplayLink, FocusGate, SensorLink, StallWatchdog};
use crate::rendering_layer::HeadlessBackend;
use crate::window_layer::WindowManager;

/// Brings the bridge up, runs the dispatch loop until quit and tears
/// everything down again.
#[tracing::instrument(level = "info", skip_all, fields(root = %config.root_dir.display()))]
pub async fn run(config: BridgeConfig, host: HostEventRx) -> Result<(), StartupError> {
	prepare_root(&config.root_dir)?;
	let result = serve(&config, host).await;
	std::fs::remove_dir(&config.root_dir).ok();
	tracing::info!("bridge stopped");
	result
}

async fn serve(config: &BridgeConfig, mut host: HostEventRx) -> Result<(), StartupError> {
	let backend = HeadlessBackend::new(config.surface_width, config.surface_height);
	let windows = WindowManager::new(backend, config.reserved_apps.iter().cloned())?;
	let sink: Box<dyn InputSink> = match &config.input_device {
		Some(path) => Box::new(EvdevWriter::open(path)?),
		None => {
			tracing::info!("no input device configured, touches are dropped");
			Box::new(NullSink)
		}
	};

	let focus = FocusGate::default();
	let (signal_tx, mut signal_rx) = tokio::sync::mpsc::unbounded_channel();
	let mut display = Channel::new(
		LinkKind::Display,
		config.display_path(),
		DisplayLink::new(
			focus.clone(),
			config.read_timeout(),
			config.unfocused_read_timeout(),
		),
	);
	let mut apps = Channel::new(
		LinkKind::Apps,
		config.app_path(),
		AppLink::new(config.app_read_timeout()),
	);
	let mut sensors = Channel::new(
		LinkKind::Sensors,
		config.sensor_path(),
		SensorLink::new(config.sensor_read_timeout()),
	);
	display
		.init(signal_tx.clone())
		.and_then(|()| display.start_thread())
		.map_err(StartupError::DisplayChannel)?;
	apps.init(signal_tx.clone())
		.and_then(|()| apps.start_thread())
		.map_err(StartupError::AppChannel)?;
	sensors
		.init(signal_tx)
		.and_then(|()| sensors.start_thread())
		.map_err(StartupError::SensorChannel)?;

	let mut dispatcher = Dispatcher::new(
		windows,
		TouchInjector::new(sink, config.max_pressure),
		ShellControl::new(config.control.clone()),
		StallWatchdog::new(config.stall_threshold()),
		focus,
	);
	tracing::info!("bridge running");
	dispatcher.run(&mut signal_rx, &mut host).await;

	drop(signal_rx);
	display.deinit();
	apps.deinit();
	sensors.deinit();
	dispatcher.shutdown();
	Ok(())
}

fn prepare_root(root: &Path) -> Result<(), StartupError> {
	let prepare = || {
		std::fs::create_dir_all(root)?;
		std::fs::set_permissions(root, Permissions::from_mode(0o770))
	};
	prepare().map_err(|source| StartupError::RootDir {
		path: root.to_path_buf(),
		source,
	})
}
