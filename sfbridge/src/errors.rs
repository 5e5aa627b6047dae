use std::path::PathBuf;

use thiserror::Error;

use crate::channel_layer::ChannelError;
use crate::config::ConfigError;
use crate::input_layer::InputError;
use crate::rendering_layer::RenderError;

/// Fatal failures while bringing the bridge up. Each subsystem exits the
/// process with its own code.
#[derive(Debug, Error)]
pub enum StartupError {
	#[error("renderer: {0}")]
	Renderer(#[from] RenderError),
	#[error("display channel: {0}")]
	DisplayChannel(#[source] ChannelError),
	#[error("app channel: {0}")]
	AppChannel(#[source] ChannelError),
	#[error("sensor channel: {0}")]
	SensorChannel(#[source] ChannelError),
	#[error("input device: {0}")]
	Input(#[from] InputError),
	#[error("configuration: {0}")]
	Config(#[from] ConfigError),
	#[error("runtime: {0}")]
	Runtime(#[source] std::io::Error),
	#[error("failed to prepare {path}: {source}")]
	RootDir {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
}

impl StartupError {
	pub fn exit_code(&self) -> u8 {
		match self {
			Self::Renderer(_) => 1,
			Self::DisplayChannel(_) => 2,
			Self::AppChannel(_) => 3,
			Self::SensorChannel(_) => 4,
			Self::Input(_) => 5,
			Self::Config(_) => 6,
			Self::Runtime(_) => 7,
			Self::RootDir { .. } => 8,
		}
	}
}
