// # Change Source Trait
//
// Defines the interface producers implement to feed state-change
// notifications into the event loop.
//
// ## Implementations
//
// - In-process channel: `ifwatch_core::ChannelSource`
// - JSON lines replay: `ifwatch-source-replay` crate
//
// ## Usage
//
// ```rust,ignore
// use ifwatch_core::{ChangeSource, EventLoop, EventLoopConfig};
//
// let source: Box<dyn ChangeSource> = /* ChangeSource implementation */;
// let (event_loop, state) = EventLoop::new(source, EventLoopConfig::default())?;
// tokio::spawn(async move { event_loop.run().await });
// ```

use std::pin::Pin;

use tokio_stream::Stream;

use crate::model::InterfaceChange;

/// Stream of notifications handed to the event loop
pub type ChangeStream = Pin<Box<dyn Stream<Item = InterfaceChange> + Send + 'static>>;

/// A producer of interface state-change notifications
///
/// The producer contract is documented on [`InterfaceChange`]. A source
/// breaking it brings the process down.
///
/// ## Stream termination
///
/// The event loop polls the stream until it ends. Ending the stream does
/// not stop the loop: watchers keep being served until shutdown.
pub trait ChangeSource: Send {
    /// Start delivering notifications
    ///
    /// Called once by the event loop when it starts running.
    fn watch(&mut self) -> ChangeStream;

    /// Short name for logs
    fn name(&self) -> &'static str;
}
