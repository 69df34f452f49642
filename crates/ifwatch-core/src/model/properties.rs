//! Interface identity, classification and properties

use std::fmt;

use serde::{Deserialize, Serialize};

use super::address::Address;

/// Stable identifier of an interface
///
/// Unique at any instant. An id may be reused once the removal of its
/// previous owner has been observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterfaceId(pub u64);

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for InterfaceId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Kind of hardware port backing a non-loopback interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DevicePortClass {
    Ethernet,
    WlanClient,
    WlanAp,
    Ppp,
    Bridge,
    Virtual,
    Lowpan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortClass {
    Loopback,
    Device(DevicePortClass),
}

impl fmt::Display for PortClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PortClass::Loopback => "loopback",
            PortClass::Device(DevicePortClass::Ethernet) => "ethernet",
            PortClass::Device(DevicePortClass::WlanClient) => "wlan_client",
            PortClass::Device(DevicePortClass::WlanAp) => "wlan_ap",
            PortClass::Device(DevicePortClass::Ppp) => "ppp",
            PortClass::Device(DevicePortClass::Bridge) => "bridge",
            PortClass::Device(DevicePortClass::Virtual) => "virtual",
            PortClass::Device(DevicePortClass::Lowpan) => "lowpan",
        };
        f.write_str(name)
    }
}

/// Legacy device classification, derived from [`PortClass`]
///
/// Older consumers only understand this coarser set. It has no lowpan
/// class; lowpan ports are reported as virtual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Loopback,
    Virtual,
    Ethernet,
    Wlan,
    Ppp,
    Bridge,
    WlanAp,
}

impl From<PortClass> for DeviceClass {
    fn from(port_class: PortClass) -> Self {
        match port_class {
            PortClass::Loopback => DeviceClass::Loopback,
            PortClass::Device(device) => match device {
                DevicePortClass::Virtual | DevicePortClass::Lowpan => DeviceClass::Virtual,
                DevicePortClass::Bridge => DeviceClass::Bridge,
                DevicePortClass::Ppp => DeviceClass::Ppp,
                DevicePortClass::Ethernet => DeviceClass::Ethernet,
                DevicePortClass::WlanClient => DeviceClass::Wlan,
                DevicePortClass::WlanAp => DeviceClass::WlanAp,
            },
        }
    }
}

/// Full property record of one interface
///
/// When carried by an [`Event::Added`](super::Event::Added) or an
/// `interface_added` notification the address list is always empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Properties {
    pub id: InterfaceId,
    pub name: String,
    pub port_class: PortClass,
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub has_default_ipv4_route: bool,
    #[serde(default)]
    pub has_default_ipv6_route: bool,
    #[serde(default)]
    pub addresses: Vec<Address>,
}

impl Properties {
    /// Properties of a freshly created interface: offline, no default
    /// routes, no addresses
    pub fn new(id: InterfaceId, name: impl Into<String>, port_class: PortClass) -> Self {
        Self {
            id,
            name: name.into(),
            port_class,
            online: false,
            has_default_ipv4_route: false,
            has_default_ipv6_route: false,
            addresses: Vec::new(),
        }
    }

    pub fn device_class(&self) -> DeviceClass {
        self.port_class.into()
    }
}

impl fmt::Display for Properties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{id: {}, name: {}, port_class: {}, online: {}, has_default_ipv4_route: {}, has_default_ipv6_route: {}",
            self.id,
            self.name,
            self.port_class,
            self.online,
            self.has_default_ipv4_route,
            self.has_default_ipv6_route,
        )?;
        for (i, address) in self.addresses.iter().enumerate() {
            let sep = if i == 0 { ", addresses: [" } else { ", " };
            write!(f, "{sep}{address}")?;
        }
        if !self.addresses.is_empty() {
            f.write_str("]")?;
        }
        f.write_str("}")
    }
}

/// The subset of an interface's properties that changed
///
/// Only `id` is always present. `addresses`, when set, is the complete
/// visible address list after the change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertiesDelta {
    pub id: InterfaceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub online: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_default_ipv4_route: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_default_ipv6_route: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Vec<Address>>,
}

impl PropertiesDelta {
    pub fn new(id: InterfaceId) -> Self {
        Self {
            id,
            online: None,
            has_default_ipv4_route: None,
            has_default_ipv6_route: None,
            addresses: None,
        }
    }

    pub fn with_online(mut self, online: bool) -> Self {
        self.online = Some(online);
        self
    }

    pub fn with_addresses(mut self, addresses: Vec<Address>) -> Self {
        self.addresses = Some(addresses);
        self
    }

    /// Whether nothing besides the id is set
    pub fn is_empty(&self) -> bool {
        self.online.is_none()
            && self.has_default_ipv4_route.is_none()
            && self.has_default_ipv6_route.is_none()
            && self.addresses.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback() -> Properties {
        let mut properties = Properties::new(InterfaceId(1), "testif01", PortClass::Loopback);
        properties.online = true;
        properties.has_default_ipv4_route = true;
        properties.has_default_ipv6_route = true;
        properties
    }

    #[test]
    fn every_port_class_has_a_device_class() {
        let cases = [
            (PortClass::Loopback, DeviceClass::Loopback),
            (PortClass::Device(DevicePortClass::Ethernet), DeviceClass::Ethernet),
            (PortClass::Device(DevicePortClass::WlanClient), DeviceClass::Wlan),
            (PortClass::Device(DevicePortClass::WlanAp), DeviceClass::WlanAp),
            (PortClass::Device(DevicePortClass::Ppp), DeviceClass::Ppp),
            (PortClass::Device(DevicePortClass::Bridge), DeviceClass::Bridge),
            (PortClass::Device(DevicePortClass::Virtual), DeviceClass::Virtual),
            (PortClass::Device(DevicePortClass::Lowpan), DeviceClass::Virtual),
        ];
        for (port_class, want) in cases {
            assert_eq!(DeviceClass::from(port_class), want, "{port_class}");
        }
    }

    #[test]
    fn properties_display() {
        assert_eq!(
            loopback().to_string(),
            "{id: 1, name: testif01, port_class: loopback, online: true, has_default_ipv4_route: true, has_default_ipv6_route: true}"
        );
    }

    #[test]
    fn delta_serializes_only_changed_fields() {
        let delta = PropertiesDelta::new(InterfaceId(7)).with_online(true);
        assert_eq!(
            serde_json::to_string(&delta).unwrap(),
            r#"{"id":7,"online":true}"#
        );
        assert!(!delta.is_empty());
        assert!(PropertiesDelta::new(InterfaceId(7)).is_empty());
    }

    #[test]
    fn port_class_wire_form() {
        let json = serde_json::to_string(&PortClass::Device(DevicePortClass::WlanAp)).unwrap();
        assert_eq!(json, r#"{"device":"wlan_ap"}"#);
        let back: PortClass = serde_json::from_str(r#""loopback""#).unwrap();
        assert_eq!(back, PortClass::Loopback);
    }
}
