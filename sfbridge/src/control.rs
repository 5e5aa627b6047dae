use std::io;
use std::process::{Child, Command};

use serde::Deserialize;
use thiserror::Error;

/// Outbound requests from the bridge to the mobile OS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlRequest {
	WakeUp,
	GoHome,
	StartApp { app: String, activity: Option<String> },
	StopApp { app: String },
	AppLostFocus { app: String },
}

impl ControlRequest {
	fn name(&self) -> &'static str {
		match self {
			Self::WakeUp => "wake_up",
			Self::GoHome => "go_home",
			Self::StartApp { .. } => "start_app",
			Self::StopApp { .. } => "stop_app",
			Self::AppLostFocus { .. } => "app_lost_focus",
		}
	}
}

#[derive(Debug, Error)]
pub enum ControlError {
	#[error("failed to spawn {request} command: {source}")]
	Spawn {
		request: &'static str,
		#[source]
		source: io::Error,
	},
}

pub trait AndroidControl {
	fn send(&mut self, request: ControlRequest) -> Result<(), ControlError>;
}

/// Shell command templates. `{app}` and `{activity}` are substituted; an
/// empty template disables that request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ControlCommands {
	/// Prepended to every command, e.g. to enter the container.
	pub command_prefix: Option<String>,
	pub wake_up: String,
	pub go_home: String,
	pub start_activity: String,
	pub start_app: String,
	pub stop_app: String,
	pub app_lost_focus: String,
}

impl Default for ControlCommands {
	fn default() -> Self {
		Self {
			command_prefix: None,
			wake_up: "input keyevent KEYCODE_WAKEUP".into(),
			go_home: "am start -a android.intent.action.MAIN -c android.intent.category.HOME".into(),
			start_activity: "am start -n {app}/{activity}".into(),
			start_app: "monkey -p {app} -c android.intent.category.LAUNCHER 1".into(),
			stop_app: "am force-stop {app}".into(),
			app_lost_focus: String::new(),
		}
	}
}

impl ControlCommands {
	/// Builds the command line for `request`, or `None` if it is disabled.
	pub fn render(&self, request: &ControlRequest) -> Option<String> {
		let (template, app, activity) = match request {
			ControlRequest::WakeUp => (&self.wake_up, "", ""),
			ControlRequest::GoHome => (&self.go_home, "", ""),
			ControlRequest::StartApp {
				app,
				activity: Some(activity),
			} => (&self.start_activity, app.as_str(), activity.as_str()),
			ControlRequest::StartApp { app, activity: None } => (&self.start_app, app.as_str(), ""),
			ControlRequest::StopApp { app } => (&self.stop_app, app.as_str(), ""),
			ControlRequest::AppLostFocus { app } => (&self.app_lost_focus, app.as_str(), ""),
		};
		if template.trim().is_empty() {
			return None;
		}
		let command = template.replace("{app}", app).replace("{activity}", activity);
		Some(match &self.command_prefix {
			Some(prefix) if !prefix.trim().is_empty() => format!("{prefix} {command}"),
			_ => command,
		})
	}
}

/// Runs requests through `$SHELL -c` without waiting for them.
#[derive(Debug)]
pub struct ShellControl {
	shell: String,
	commands: ControlCommands,
}

impl ShellControl {
	pub fn new(commands: ControlCommands) -> Self {
		let shell = std::env::var("SHELL").unwrap_or_else(|_| "sh".to_string());
		Self { shell, commands }
	}
}

impl AndroidControl for ShellControl {
	#[tracing::instrument(level = "debug", skip(self))]
	fn send(&mut self, request: ControlRequest) -> Result<(), ControlError> {
		let Some(cmdline) = self.commands.render(&request) else {
			return Ok(());
		};
		let mut cmd = Command::new(&self.shell);
		cmd.args(["-c", &cmdline]);
		let child = cmd.spawn().map_err(|source| ControlError::Spawn {
			request: request.name(),
			source,
		})?;
		tracing::debug!(pid = child.id(), %cmdline, "spawned control command");
		reap(child, request.name());
		Ok(())
	}
}

fn reap(mut child: Child, request: &'static str) {
	let spawned = std::thread::Builder::new()
		.name("control-reaper".into())
		.spawn(move || match child.wait() {
			Ok(status) if !status.success() => {
				tracing::warn!(request, %status, "control command failed");
			}
			Ok(_) => {}
			Err(e) => tracing::warn!(request, "failed to wait for control command: {e}"),
		});
	if let Err(e) = spawned {
		tracing::warn!("failed to spawn reaper thread: {e}");
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn templates_substitute_app_and_activity() {
		let commands = ControlCommands::default();
		let start = ControlRequest::StartApp {
			app: "com.a".into(),
			activity: Some(".Main".into()),
		};
		assert_eq!(commands.render(&start).unwrap(), "am start -n com.a/.Main");
		let launch = ControlRequest::StartApp {
			app: "com.a".into(),
			activity: None,
		};
		assert!(commands.render(&launch).unwrap().starts_with("monkey -p com.a "));
	}

	#[test]
	fn empty_template_disables_request() {
		let commands = ControlCommands::default();
		let lost = ControlRequest::AppLostFocus { app: "com.a".into() };
		assert_eq!(commands.render(&lost), None);
	}

	#[test]
	fn prefix_is_prepended() {
		let commands = ControlCommands {
			command_prefix: Some("lxc-attach -n android --".into()),
			..Default::default()
		};
		assert_eq!(
			commands.render(&ControlRequest::StopApp { app: "x".into() }).unwrap(),
			"lxc-attach -n android -- am force-stop x"
		);
	}

	#[test]
	fn shell_control_runs_commands() {
		let marker = std::env::temp_dir().join(format!("sfbridge-control-{}", std::process::id()));
		let mut control = ShellControl {
			shell: "sh".into(),
			commands: ControlCommands {
				wake_up: format!("touch {}", marker.display()),
				..Default::default()
			},
		};
		control.send(ControlRequest::WakeUp).unwrap();
		let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
		while !marker.exists() && std::time::Instant::now() < deadline {
			std::thread::sleep(std::time::Duration::from_millis(10));
		}
		assert!(marker.exists());
		std::fs::remove_file(&marker).ok();
	}
}
