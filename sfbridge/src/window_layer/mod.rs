//! App/window lifecycle: one surface per mobile app plus the default
//! surface, with focus routed to exactly one of them.

mod manager;

pub use manager::{Focus, WindowEntry, WindowManager};
