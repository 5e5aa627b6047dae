use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use sfbridge_protocol::{APP_SOCKET, DEFAULT_ROOT, DISPLAY_SOCKET, SENSOR_SOCKET};
use thiserror::Error;

use crate::control::ControlCommands;

pub const CONFIG_ENV: &str = "SFBRIDGE_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read config {path}: {source}")]
	Read {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
	#[error("failed to parse config {path}: {source}")]
	Parse {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},
	#[error("invalid config: {0}")]
	Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
	pub root_dir: PathBuf,
	pub display_socket: String,
	pub app_socket: String,
	pub sensor_socket: String,
	/// Display read timeout while the bridge has host focus.
	pub read_timeout_ms: u64,
	pub unfocused_read_timeout_ms: u64,
	/// Idle time without buffers after which a heartbeat render is forced.
	pub stall_threshold_ms: u64,
	pub app_read_timeout_ms: u64,
	pub sensor_read_timeout_ms: u64,
	pub reserved_apps: Vec<String>,
	pub input_device: Option<PathBuf>,
	pub max_pressure: i32,
	pub surface_width: u32,
	pub surface_height: u32,
	pub control: ControlCommands,
}

impl Default for BridgeConfig {
	fn default() -> Self {
		Self {
			root_dir: PathBuf::from(DEFAULT_ROOT),
			display_socket: DISPLAY_SOCKET.into(),
			app_socket: APP_SOCKET.into(),
			sensor_socket: SENSOR_SOCKET.into(),
			read_timeout_ms: 100,
			unfocused_read_timeout_ms: 1000,
			stall_threshold_ms: 1000,
			app_read_timeout_ms: 250,
			sensor_read_timeout_ms: 250,
			reserved_apps: vec![
				"com.android.launcher3".into(),
				"com.android.systemui".into(),
			],
			input_device: None,
			max_pressure: 255,
			surface_width: 720,
			surface_height: 1280,
			control: ControlCommands::default(),
		}
	}
}

impl BridgeConfig {
	/// Reads `$SFBRIDGE_CONFIG` if set, applies environment overrides and
	/// validates the result.
	pub fn load() -> Result<Self, ConfigError> {
		let mut config = match std::env::var_os(CONFIG_ENV) {
			Some(path) => Self::from_file(Path::new(&path))?,
			None => Self::default(),
		};
		config.apply_env(|name| std::env::var(name).ok());
		config.validate()?;
		Ok(config)
	}

	#[tracing::instrument(level = "info")]
	pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
		let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
			path: path.to_path_buf(),
			source,
		})?;
		serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
			path: path.to_path_buf(),
			source,
		})
	}

	/// Overrides fields from `SFBRIDGE_*` variables. Values that do not parse
	/// are logged and ignored.
	pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
		if let Some(root) = lookup("SFBRIDGE_ROOT").filter(|v| !v.trim().is_empty()) {
			self.root_dir = PathBuf::from(root.trim());
		}
		if let Some(device) = lookup("SFBRIDGE_INPUT_DEVICE").filter(|v| !v.trim().is_empty()) {
			self.input_device = Some(PathBuf::from(device.trim()));
		}
		if let Some(ms) = env_millis(&lookup, "SFBRIDGE_READ_TIMEOUT_MS") {
			self.read_timeout_ms = ms;
		}
		if let Some(ms) = env_millis(&lookup, "SFBRIDGE_STALL_THRESHOLD_MS") {
			self.stall_threshold_ms = ms;
		}
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		let invalid = |msg: String| Err(ConfigError::Invalid(msg));
		for (name, ms) in [
			("read_timeout_ms", self.read_timeout_ms),
			("unfocused_read_timeout_ms", self.unfocused_read_timeout_ms),
			("app_read_timeout_ms", self.app_read_timeout_ms),
			("sensor_read_timeout_ms", self.sensor_read_timeout_ms),
		] {
			if ms == 0 {
				return invalid(format!("{name} must be positive"));
			}
		}
		if self.stall_threshold_ms < self.read_timeout_ms {
			return invalid(format!(
				"stall_threshold_ms ({}) is below read_timeout_ms ({})",
				self.stall_threshold_ms, self.read_timeout_ms
			));
		}
		for (name, socket) in [
			("display_socket", &self.display_socket),
			("app_socket", &self.app_socket),
			("sensor_socket", &self.sensor_socket),
		] {
			if socket.is_empty() || socket.contains('/') {
				return invalid(format!("{name} must be a plain file name, got {socket:?}"));
			}
		}
		if self.max_pressure <= 0 {
			return invalid(format!("max_pressure must be positive, got {}", self.max_pressure));
		}
		if self.surface_width == 0 || self.surface_height == 0 {
			return invalid("surface size must be non-zero".into());
		}
		Ok(())
	}

	pub fn display_path(&self) -> PathBuf {
		self.root_dir.join(&self.display_socket)
	}

	pub fn app_path(&self) -> PathBuf {
		self.root_dir.join(&self.app_socket)
	}

	pub fn sensor_path(&self) -> PathBuf {
		self.root_dir.join(&self.sensor_socket)
	}

	pub fn read_timeout(&self) -> Duration {
		Duration::from_millis(self.read_timeout_ms)
	}

	pub fn unfocused_read_timeout(&self) -> Duration {
		Duration::from_millis(self.unfocused_read_timeout_ms)
	}

	pub fn stall_threshold(&self) -> Duration {
		Duration::from_millis(self.stall_threshold_ms)
	}

	pub fn app_read_timeout(&self) -> Duration {
		Duration::from_millis(self.app_read_timeout_ms)
	}

	pub fn sensor_read_timeout(&self) -> Duration {
		Duration::from_millis(self.sensor_read_timeout_ms)
	}
}

fn env_millis(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<u64> {
	let raw = lookup(name)?;
	match raw.trim().parse::<u64>() {
		Ok(ms) if ms > 0 => Some(ms),
		Ok(_) => {
			tracing::warn!(value = %raw, "{name} must be positive, ignoring");
			None
		}
		Err(e) => {
			tracing::warn!(value = %raw, "invalid {name}: {e}");
			None
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;

	fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let vars: HashMap<String, String> = vars
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect();
		move |name| vars.get(name).cloned()
	}

	#[test]
	fn defaults_are_valid() {
		let config = BridgeConfig::default();
		config.validate().unwrap();
		assert_eq!(config.display_path(), Path::new("/tmp/sfbridge/display"));
	}

	#[test]
	fn partial_json_keeps_defaults() {
		let config: BridgeConfig = serde_json::from_str(
			r#"{ "read_timeout_ms": 40, "control": { "command_prefix": "lxc-attach -n android --" } }"#,
		)
		.unwrap();
		assert_eq!(config.read_timeout(), Duration::from_millis(40));
		assert_eq!(config.stall_threshold_ms, 1000);
		assert_eq!(
			config.control.command_prefix.as_deref(),
			Some("lxc-attach -n android --")
		);
		assert_eq!(config.control.stop_app, "am force-stop {app}");
	}

	#[test]
	fn env_overrides_and_bad_values() {
		let mut config = BridgeConfig::default();
		config.apply_env(env(&[
			("SFBRIDGE_ROOT", "/run/bridge"),
			("SFBRIDGE_READ_TIMEOUT_MS", "50"),
			("SFBRIDGE_STALL_THRESHOLD_MS", "soon"),
			("SFBRIDGE_INPUT_DEVICE", "/dev/input/event3"),
		]));
		assert_eq!(config.root_dir, Path::new("/run/bridge"));
		assert_eq!(config.read_timeout_ms, 50);
		assert_eq!(config.stall_threshold_ms, 1000);
		assert_eq!(config.input_device.as_deref(), Some(Path::new("/dev/input/event3")));
	}

	#[test]
	fn stall_threshold_below_read_timeout_is_rejected() {
		let config = BridgeConfig {
			read_timeout_ms: 500,
			stall_threshold_ms: 100,
			..Default::default()
		};
		assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
	}

	#[test]
	fn socket_names_must_be_plain() {
		let config = BridgeConfig {
			app_socket: "../apps".into(),
			..Default::default()
		};
		assert!(config.validate().is_err());
	}
}
