mod dispatcher;

pub use dispatcher::{Dispatcher, Flow, FrameStats};
