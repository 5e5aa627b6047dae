//! Socket listener plus background thread per link, and the single-slot
//! handoff that keeps each link at most one event ahead of the dispatch loop.

mod channel;
pub mod handoff;

pub use channel::{Channel, ChannelError, LinkProtocol};
pub use handoff::{Consumed, Handoff};
