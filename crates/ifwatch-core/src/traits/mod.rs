//! Core traits for the interface watcher system
//!
//! - [`ChangeSource`]: Produce interface state-change notifications

pub mod change_source;

pub use change_source::{ChangeSource, ChangeStream};
