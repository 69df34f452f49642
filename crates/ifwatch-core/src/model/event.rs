use std::fmt;

use serde::{Deserialize, Serialize};

use super::properties::{InterfaceId, Properties, PropertiesDelta};

/// An event delivered to a watcher
///
/// A watcher first receives one `Existing` per interface known when it
/// registered, then a single `Idle`, then incremental events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    Existing(Properties),
    Idle,
    Added(Properties),
    Removed(InterfaceId),
    Changed(PropertiesDelta),
}

impl Event {
    /// The interface this event is about, if any
    pub fn interface_id(&self) -> Option<InterfaceId> {
        match self {
            Event::Existing(properties) | Event::Added(properties) => Some(properties.id),
            Event::Removed(id) => Some(*id),
            Event::Changed(delta) => Some(delta.id),
            Event::Idle => None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Existing(properties) => write!(f, "existing {properties}"),
            Event::Idle => f.write_str("idle"),
            Event::Added(properties) => write!(f, "added {properties}"),
            Event::Removed(id) => write!(f, "removed {{id: {id}}}"),
            Event::Changed(delta) => {
                write!(f, "changed {{id: {}", delta.id)?;
                if let Some(online) = delta.online {
                    write!(f, ", online: {online}")?;
                }
                if let Some(v4) = delta.has_default_ipv4_route {
                    write!(f, ", has_default_ipv4_route: {v4}")?;
                }
                if let Some(v6) = delta.has_default_ipv6_route {
                    write!(f, ", has_default_ipv6_route: {v6}")?;
                }
                if let Some(addresses) = &delta.addresses {
                    write!(f, ", addresses: {}", addresses.len())?;
                }
                f.write_str("}")
            }
        }
    }
}
