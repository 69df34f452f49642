//! Built-in change sources

mod channel;

pub use channel::{ChangeSender, ChannelSource};
