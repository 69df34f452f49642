//! State-change notifications emitted by the network stack

use std::fmt;

use serde::{Deserialize, Serialize};

use super::address::{AddressRecord, Subnet};
use super::properties::{InterfaceId, Properties};

/// Why an address went away
///
/// Informational only; every reason is handled the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressRemovalReason {
    #[default]
    ManualAction,
    InterfaceRemoved,
    DadFailed,
    Invalidated,
}

impl fmt::Display for AddressRemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AddressRemovalReason::ManualAction => "manual_action",
            AddressRemovalReason::InterfaceRemoved => "interface_removed",
            AddressRemovalReason::DadFailed => "dad_failed",
            AddressRemovalReason::Invalidated => "invalidated",
        })
    }
}

/// A state transition reported by a producer
///
/// Producers promise:
/// - an interface is added once, without addresses, before any other
///   notification names it
/// - `OnlineChanged` is only sent on a real transition
/// - `AddressRemoved` only names addresses previously reported
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InterfaceChange {
    InterfaceAdded(Properties),
    InterfaceRemoved {
        id: InterfaceId,
    },
    DefaultRouteChanged {
        id: InterfaceId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        has_default_ipv4_route: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        has_default_ipv6_route: Option<bool>,
    },
    OnlineChanged {
        id: InterfaceId,
        online: bool,
    },
    AddressChanged {
        id: InterfaceId,
        addr: Subnet,
        #[serde(flatten)]
        record: AddressRecord,
    },
    AddressRemoved {
        id: InterfaceId,
        addr: Subnet,
        #[serde(default)]
        reason: AddressRemovalReason,
    },
}

impl InterfaceChange {
    pub fn interface_id(&self) -> InterfaceId {
        match self {
            InterfaceChange::InterfaceAdded(properties) => properties.id,
            InterfaceChange::InterfaceRemoved { id }
            | InterfaceChange::DefaultRouteChanged { id, .. }
            | InterfaceChange::OnlineChanged { id, .. }
            | InterfaceChange::AddressChanged { id, .. }
            | InterfaceChange::AddressRemoved { id, .. } => *id,
        }
    }
}

impl fmt::Display for InterfaceChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterfaceChange::InterfaceAdded(properties) => {
                write!(f, "interface_added {properties}")
            }
            InterfaceChange::InterfaceRemoved { id } => write!(f, "interface_removed {{id: {id}}}"),
            InterfaceChange::DefaultRouteChanged {
                id,
                has_default_ipv4_route,
                has_default_ipv6_route,
            } => {
                write!(f, "default_route_changed {{id: {id}")?;
                if let Some(v4) = has_default_ipv4_route {
                    write!(f, ", has_default_ipv4_route: {v4}")?;
                }
                if let Some(v6) = has_default_ipv6_route {
                    write!(f, ", has_default_ipv6_route: {v6}")?;
                }
                f.write_str("}")
            }
            InterfaceChange::OnlineChanged { id, online } => {
                write!(f, "online_changed {{id: {id}, online: {online}}}")
            }
            InterfaceChange::AddressChanged { id, addr, record } => write!(
                f,
                "address_changed {{id: {id}, addr: {addr}, valid_until: {}, preferred_lifetime: {}, state: {}}}",
                record.valid_until, record.preferred_lifetime, record.assignment_state
            ),
            InterfaceChange::AddressRemoved { id, addr, reason } => {
                write!(f, "address_removed {{id: {id}, addr: {addr}, reason: {reason}}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::model::{AssignmentState, PreferredLifetimeInfo, Timestamp};

    fn subnet() -> Subnet {
        "1.2.3.4/16".parse().unwrap()
    }

    #[test]
    fn default_route_display_skips_absent_fields() {
        let change = InterfaceChange::DefaultRouteChanged {
            id: InterfaceId(1),
            has_default_ipv4_route: None,
            has_default_ipv6_route: None,
        };
        assert_eq!(change.to_string(), "default_route_changed {id: 1}");

        let change = InterfaceChange::DefaultRouteChanged {
            id: InterfaceId(1),
            has_default_ipv4_route: Some(true),
            has_default_ipv6_route: Some(true),
        };
        assert_eq!(
            change.to_string(),
            "default_route_changed {id: 1, has_default_ipv4_route: true, has_default_ipv6_route: true}"
        );
    }

    #[test]
    fn address_changed_display() {
        let minute = Timestamp::after_boot(Duration::from_secs(60));
        let change = InterfaceChange::AddressChanged {
            id: InterfaceId(1),
            addr: subnet(),
            record: AddressRecord::assigned()
                .with_valid_until(minute)
                .with_preferred_lifetime(PreferredLifetimeInfo::PreferredUntil(minute)),
        };
        assert_eq!(
            change.to_string(),
            "address_changed {id: 1, addr: 1.2.3.4/16, valid_until: boot+60s, preferred_lifetime: boot+60s, state: assigned}"
        );
    }

    #[test]
    fn address_removed_display() {
        let change = InterfaceChange::AddressRemoved {
            id: InterfaceId(1),
            addr: subnet(),
            reason: AddressRemovalReason::ManualAction,
        };
        assert_eq!(
            change.to_string(),
            "address_removed {id: 1, addr: 1.2.3.4/16, reason: manual_action}"
        );
    }

    #[test]
    fn tagged_wire_form() {
        let change: InterfaceChange = serde_json::from_str(
            r#"{"type":"address_changed","id":3,"addr":"fe80::1/64","assignment_state":"tentative"}"#,
        )
        .unwrap();
        assert_eq!(
            change,
            InterfaceChange::AddressChanged {
                id: InterfaceId(3),
                addr: "fe80::1/64".parse().unwrap(),
                record: AddressRecord::new(AssignmentState::Tentative),
            }
        );
        assert_eq!(change.interface_id(), InterfaceId(3));
    }
}
