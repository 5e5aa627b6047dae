use std::fs::File;
use std::io::{IoSlice, Read, Write};
use std::os::fd::{AsFd, AsRawFd};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use nix::sys::socket::{ControlMessage, MsgFlags, sendmsg};
use sfbridge::channel_layer::Channel;
use sfbridge::comms::link2dispatch::{LinkEvent, LinkKind, LinkSignal, LinkSignalRx};
use sfbridge::links::{AppLink, DisplayLink, FocusGate};
use sfbridge_protocol::{BufferInfo, DisplayMessage, Lifecycle, PixelFormat, ReleaseStatus};

const READ_TIMEOUT: Duration = Duration::from_millis(40);

fn scratch_dir(name: &str) -> PathBuf {
	let dir = std::env::temp_dir().join(format!("sfbridge-it-{}-{name}", std::process::id()));
	std::fs::create_dir_all(&dir).unwrap();
	dir
}

fn display_channel(name: &str) -> (Channel<DisplayLink>, LinkSignalRx, PathBuf) {
	let path = scratch_dir(name).join("display");
	let focus = FocusGate::default();
	focus.set(true);
	let mut channel = Channel::new(
		LinkKind::Display,
		&path,
		DisplayLink::new(focus, READ_TIMEOUT, READ_TIMEOUT),
	);
	let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
	channel.init(tx).unwrap();
	channel.start_thread().unwrap();
	(channel, rx, path)
}

fn info() -> BufferInfo {
	BufferInfo {
		width: 64,
		height: 32,
		stride: 64,
		format: PixelFormat::RGBA_8888,
	}
}

fn send_buffer(client: &UnixStream, ints: &[i32]) {
	let memory = File::open("/dev/null").unwrap();
	let fds = [memory.as_fd().as_raw_fd()];
	let bytes = DisplayMessage::encode_buffer(&info(), fds.len(), ints);
	sendmsg::<()>(
		client.as_raw_fd(),
		&[IoSlice::new(&bytes)],
		&[ControlMessage::ScmRights(&fds)],
		MsgFlags::empty(),
		None,
	)
	.unwrap();
}

/// Waits for the next signal that is not an idle notification.
fn next_non_idle(rx: &mut LinkSignalRx) -> LinkSignal {
	let deadline = Instant::now() + Duration::from_secs(5);
	while Instant::now() < deadline {
		match rx.try_recv() {
			Ok(signal) if matches!(signal.event, LinkEvent::NoBuffer { .. }) => drop(signal),
			Ok(signal) => return signal,
			Err(_) => thread::sleep(Duration::from_millis(5)),
		}
	}
	panic!("no event within deadline");
}

fn read_status(client: &mut UnixStream) -> ReleaseStatus {
	let mut raw = [0u8; ReleaseStatus::LEN];
	client.read_exact(&mut raw).unwrap();
	ReleaseStatus::from_bytes(raw).unwrap()
}

#[test]
fn buffer_with_descriptor_is_staged_and_acknowledged_once() {
	let (mut channel, mut rx, path) = display_channel("ack");
	let mut client = UnixStream::connect(&path).unwrap();
	client.set_read_timeout(Some(Duration::from_millis(300))).unwrap();
	send_buffer(&client, &[7, 11]);

	let signal = next_non_idle(&mut rx);
	assert_eq!(signal.link, LinkKind::Display);
	assert!(channel.have_client());
	let (_, event, consumed) = signal.into_parts();
	let LinkEvent::Buffer(buffer) = event else {
		panic!("expected a buffer");
	};
	assert_eq!(*buffer.info(), info());
	assert_eq!(buffer.buffer().handle.num_fds(), 1);
	assert_eq!(buffer.buffer().handle.ints(), &[7, 11]);
	assert!(channel.is_staged());
	buffer.release(false).unwrap();
	drop(consumed);

	assert_eq!(read_status(&mut client), ReleaseStatus::Rendered);
	let mut extra = [0u8; 4];
	assert!(client.read(&mut extra).is_err(), "a second acknowledgement arrived");
	channel.deinit();
}

#[test]
fn dropped_buffer_is_reported_as_failed() {
	let (mut channel, mut rx, path) = display_channel("drop");
	let mut client = UnixStream::connect(&path).unwrap();
	send_buffer(&client, &[]);
	drop(next_non_idle(&mut rx));
	assert_eq!(read_status(&mut client), ReleaseStatus::Failed);
	channel.deinit();
}

#[test]
fn silent_producer_yields_idle_notifications() {
	let (mut channel, mut rx, path) = display_channel("idle");
	let _client = UnixStream::connect(&path).unwrap();
	let signal = rx.blocking_recv().unwrap();
	match signal.event {
		LinkEvent::NoBuffer { waited } => assert!(waited >= READ_TIMEOUT / 2),
		ref other => panic!("unexpected event {other:?}"),
	}
	drop(signal);
	channel.deinit();
}

#[test]
fn one_event_outstanding_until_consumed() {
	let (mut channel, mut rx, path) = display_channel("backpressure");
	let client = UnixStream::connect(&path).unwrap();
	send_buffer(&client, &[1]);
	send_buffer(&client, &[2]);
	let first = next_non_idle(&mut rx);
	thread::sleep(Duration::from_millis(200));
	assert!(rx.try_recv().is_err(), "second event staged before the first was consumed");
	assert!(channel.is_staged());
	drop(first);

	let second = next_non_idle(&mut rx);
	let LinkEvent::Buffer(buffer) = &second.event else {
		panic!("expected a buffer");
	};
	assert_eq!(buffer.buffer().handle.ints(), &[2]);
	drop(second);
	channel.deinit();
}

#[test]
fn malformed_frame_resets_to_accepting() {
	let (mut channel, mut rx, path) = display_channel("reset");
	let mut bad = UnixStream::connect(&path).unwrap();
	bad.write_all(&[9, 0, 0, 0, 0, 0, 0, 0]).unwrap();
	let deadline = Instant::now() + Duration::from_secs(5);
	let mut probe = [0u8; 1];
	bad.set_read_timeout(Some(Duration::from_millis(50))).unwrap();
	loop {
		while let Ok(signal) = rx.try_recv() {
			drop(signal);
		}
		if let Ok(0) = bad.read(&mut probe) {
			break;
		}
		assert!(Instant::now() < deadline, "client was not dropped");
	}

	let client = UnixStream::connect(&path).unwrap();
	send_buffer(&client, &[3]);
	let signal = next_non_idle(&mut rx);
	assert!(matches!(signal.event, LinkEvent::Buffer(_)));
	drop(signal);
	channel.deinit();
}

#[test]
fn clean_disconnect_then_reconnect_is_served() {
	let (mut channel, mut rx, path) = display_channel("reconnect");
	let mut first = UnixStream::connect(&path).unwrap();
	send_buffer(&first, &[4]);
	drop(next_non_idle(&mut rx));
	assert_eq!(read_status(&mut first), ReleaseStatus::Failed);
	drop(first);

	let deadline = Instant::now() + Duration::from_secs(5);
	while channel.have_client() {
		while let Ok(signal) = rx.try_recv() {
			drop(signal);
		}
		assert!(Instant::now() < deadline, "disconnect was not noticed");
		thread::sleep(Duration::from_millis(5));
	}

	let mut second = UnixStream::connect(&path).unwrap();
	send_buffer(&second, &[5]);
	let signal = next_non_idle(&mut rx);
	assert!(channel.have_client());
	let (_, event, consumed) = signal.into_parts();
	let LinkEvent::Buffer(buffer) = event else {
		panic!("expected a buffer");
	};
	assert_eq!(buffer.buffer().handle.ints(), &[5]);
	buffer.release(false).unwrap();
	drop(consumed);
	assert_eq!(read_status(&mut second), ReleaseStatus::Rendered);
	channel.deinit();
}

#[test]
fn app_link_delivers_notices() {
	let path = scratch_dir("apps").join("apps");
	let mut channel = Channel::new(LinkKind::Apps, &path, AppLink::new(READ_TIMEOUT));
	let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
	channel.init(tx).unwrap();
	channel.start_thread().unwrap();
	let mut client = UnixStream::connect(&path).unwrap();
	client.write_all(b"open com.a/.Main\nclose com.a\n").unwrap();

	let open = rx.blocking_recv().unwrap();
	let LinkEvent::App(notice) = &open.event else {
		panic!("expected an app notice");
	};
	assert_eq!(notice.lifecycle, Lifecycle::Open);
	assert_eq!(notice.target.activity.as_deref(), Some(".Main"));
	drop(open);
	let close = rx.blocking_recv().unwrap();
	assert!(matches!(&close.event, LinkEvent::App(n) if n.lifecycle == Lifecycle::Close));
	drop(close);
	channel.deinit();
}

#[test]
fn stop_and_deinit_are_prompt() {
	let (mut idle_channel, _rx, idle_path) = display_channel("stop-accept");
	let started = Instant::now();
	idle_channel.stop_thread();
	assert!(!idle_channel.is_running());
	assert!(started.elapsed() < Duration::from_secs(2));
	idle_channel.deinit();
	assert!(!idle_path.exists());

	let (mut busy_channel, mut rx, busy_path) = display_channel("stop-busy");
	let _client = UnixStream::connect(&busy_path).unwrap();
	let pending = rx.blocking_recv().unwrap();
	let started = Instant::now();
	busy_channel.deinit();
	assert!(started.elapsed() < Duration::from_secs(2));
	assert!(!busy_path.exists());
	drop(pending);
}
