use crate::input_layer::TouchPoint;
use crate::rendering_layer::WindowId;

/// Events produced by the host windowing system.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
	Quit,
	FocusGained { window: WindowId },
	FocusLost { window: WindowId },
	WindowClosed { window: WindowId },
	/// The window was minimised or hidden (`false`) or shown again (`true`).
	Visibility { window: WindowId, visible: bool },
	Touch(TouchPoint),
}

pub type HostEventRx = tokio::sync::mpsc::UnboundedReceiver<HostEvent>;
pub type HostEventTx = tokio::sync::mpsc::UnboundedSender<HostEvent>;
