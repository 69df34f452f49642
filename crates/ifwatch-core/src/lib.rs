// # ifwatch-core
//
// Core library for the interface-state change-notification service.
//
// ## Architecture Overview
//
// Observers watch a network stack's interface and address state and
// receive a consistent, ordered, de-duplicated stream of changes:
// - **ChangeSource**: Trait for producers of state-change notifications
// - **EventLoop**: Owns the property store, applies notifications and fans
//   events out to watchers
// - **InterfaceState**: Registration gateway handing out watchers
// - **WatcherProxy**: Consumer handle with a single "pull next event" call
// - **Address Classifier**: Decides which address transitions each watcher
//   is interested in
//
// ## Design Principles
//
// 1. **Single writer**: Only the event loop touches interface state
// 2. **Snapshot then diffs**: Every watcher starts from `Existing`* `Idle`
// 3. **Never block producers**: Slow watchers are dropped, not waited on
// 4. **Fail fast**: Producer contract violations abort

pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod model;
pub mod source;
pub mod stats;
pub mod store;
pub mod traits;
pub mod watcher;

// Re-export core types for convenience
pub use classify::AddressPropertiesInterest;
pub use config::{EventLoopConfig, WatcherOptions};
pub use engine::EventLoop;
pub use error::{CloseReason, Error, Result};
pub use gateway::{InterfaceState, WatcherRequest};
pub use model::{
    Address, AddressRecord, AddressRemovalReason, AssignmentState, DeviceClass, DevicePortClass,
    Event, InterfaceChange, InterfaceId, PortClass, PreferredLifetimeInfo, Properties,
    PropertiesDelta, Subnet, Timestamp,
};
pub use source::{ChangeSender, ChannelSource};
pub use stats::WatcherStats;
pub use traits::{ChangeSource, ChangeStream};
pub use watcher::{WatcherProxy, WatcherServerEnd, watcher_endpoints};
