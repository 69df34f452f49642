//! Data model shared by producers, the event loop and watchers

mod address;
mod change;
mod event;
mod properties;

pub use address::{Address, AddressRecord, AssignmentState, PreferredLifetimeInfo, Subnet, Timestamp};
pub use change::{AddressRemovalReason, InterfaceChange};
pub use event::Event;
pub use properties::{
    DeviceClass, DevicePortClass, InterfaceId, PortClass, Properties, PropertiesDelta,
};
