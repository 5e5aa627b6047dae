/// Headers of the line-oriented app-lifecycle link.
pub const OPEN: &str = "open";
pub const CLOSE: &str = "close";

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct MessageHeader(pub String);
impl<S: Into<String>> From<S> for MessageHeader {
	fn from(value: S) -> Self {
		Self(value.into())
	}
}
