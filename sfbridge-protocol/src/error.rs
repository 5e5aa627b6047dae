use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
	#[error("io error: {0}")]
	Io(#[from] std::io::Error),
	#[error("socket error: {0}")]
	Nix(#[from] nix::Error),
	#[error("peer closed the connection")]
	UnexpectedEof,
	#[error("control data was truncated by the kernel")]
	Truncated,
	#[error("unknown display message kind {0}")]
	UnknownKind(u32),
	#[error("unknown message header {0:?}")]
	UnknownHeader(String),
	#[error("invalid payload: {0}")]
	InvalidPayload(String),
	#[error("frame announces {expected} file descriptors but {got} arrived")]
	FdCountMismatch { expected: usize, got: usize },
	#[error("frame of {len} bytes exceeds the limit of {max}")]
	FrameTooLarge { len: usize, max: usize },
}
