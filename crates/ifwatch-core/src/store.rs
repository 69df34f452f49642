//! Property Store
//!
//! The authoritative per-interface record. Owned by the event loop and
//! never shared, so it carries no synchronization of its own.
//!
//! Producer contract violations detected here panic: continuing would mean
//! serving state that no longer matches the network stack.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use crate::model::{Address, AddressRecord, InterfaceId, Properties, PropertiesDelta, Subnet};

/// One interface: its scalar properties plus every known address
///
/// `properties.addresses` is kept empty; the address list is always derived
/// from `addresses`, which includes non-assigned entries.
#[derive(Debug, Clone)]
pub struct InterfaceEntry {
    properties: Properties,
    addresses: BTreeMap<Subnet, AddressRecord>,
}

impl InterfaceEntry {
    fn new(properties: Properties) -> Self {
        Self {
            properties,
            addresses: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> InterfaceId {
        self.properties.id
    }

    pub fn online(&self) -> bool {
        self.properties.online
    }

    pub fn address(&self, addr: &Subnet) -> Option<&AddressRecord> {
        self.addresses.get(addr)
    }

    /// Applies the default-route flags that actually differ
    ///
    /// Returns `None` when neither flag changed.
    pub fn apply_default_routes(
        &mut self,
        ipv4: Option<bool>,
        ipv6: Option<bool>,
    ) -> Option<PropertiesDelta> {
        let mut delta = PropertiesDelta::new(self.id());
        if let Some(v4) = ipv4.filter(|v4| *v4 != self.properties.has_default_ipv4_route) {
            self.properties.has_default_ipv4_route = v4;
            delta.has_default_ipv4_route = Some(v4);
        }
        if let Some(v6) = ipv6.filter(|v6| *v6 != self.properties.has_default_ipv6_route) {
            self.properties.has_default_ipv6_route = v6;
            delta.has_default_ipv6_route = Some(v6);
        }
        (!delta.is_empty()).then_some(delta)
    }

    /// # Panics
    ///
    /// If `online` equals the stored value.
    pub fn apply_online(&mut self, online: bool) -> PropertiesDelta {
        if self.properties.online == online {
            panic!(
                "online changed notification for interface {} with no actual change (online: {online})",
                self.properties
            );
        }
        self.properties.online = online;
        PropertiesDelta::new(self.id()).with_online(online)
    }

    /// Replaces (or inserts) the record for `addr`, returning the previous one
    pub fn upsert_address(&mut self, addr: Subnet, record: AddressRecord) -> Option<AddressRecord> {
        self.addresses.insert(addr, record)
    }

    /// # Panics
    ///
    /// If `addr` is not known on this interface.
    pub fn remove_address(&mut self, addr: &Subnet) -> AddressRecord {
        match self.addresses.remove(addr) {
            Some(record) => record,
            None => panic!(
                "address removed notification for unknown address {addr} on interface {}",
                self.id()
            ),
        }
    }

    /// Every known address in subnet order, including non-assigned ones,
    /// with all properties populated
    pub fn addresses(&self) -> Vec<Address> {
        self.addresses
            .iter()
            .map(|(addr, record)| Address::from_record(*addr, record))
            .collect()
    }

    /// A deep copy of the full properties, addresses included
    pub fn snapshot(&self) -> Properties {
        Properties {
            addresses: self.addresses(),
            ..self.properties.clone()
        }
    }
}

/// Mapping from interface id to its entry
#[derive(Debug, Default)]
pub struct PropertyStore {
    interfaces: BTreeMap<InterfaceId, InterfaceEntry>,
}

impl PropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }

    pub fn contains(&self, id: InterfaceId) -> bool {
        self.interfaces.contains_key(&id)
    }

    pub fn get(&self, id: InterfaceId) -> Option<&InterfaceEntry> {
        self.interfaces.get(&id)
    }

    /// Entry for `id`, or `None` for interfaces that may legitimately be
    /// gone already
    pub fn get_mut(&mut self, id: InterfaceId) -> Option<&mut InterfaceEntry> {
        self.interfaces.get_mut(&id)
    }

    /// Entry for an interface the producer guarantees exists
    ///
    /// # Panics
    ///
    /// If `id` is unknown. `what` names the notification for the message.
    pub fn known_mut(&mut self, id: InterfaceId, what: &str) -> &mut InterfaceEntry {
        match self.interfaces.get_mut(&id) {
            Some(entry) => entry,
            None => panic!("{what} notification for unknown interface {id}"),
        }
    }

    /// Entries in interface id order
    pub fn iter(&self) -> impl Iterator<Item = &InterfaceEntry> {
        self.interfaces.values()
    }

    /// Adds a new interface
    ///
    /// # Panics
    ///
    /// If `properties` carries addresses or the id is already present.
    pub fn insert(&mut self, properties: Properties) {
        if !properties.addresses.is_empty() {
            panic!("interface added notification contains addresses: {properties}");
        }
        match self.interfaces.entry(properties.id) {
            Entry::Occupied(_) => {
                panic!("interface already exists but duplicate added notification received: {properties}")
            }
            Entry::Vacant(slot) => {
                slot.insert(InterfaceEntry::new(properties));
            }
        }
    }

    /// Removes an interface together with all of its addresses
    ///
    /// # Panics
    ///
    /// If `id` is unknown.
    pub fn remove(&mut self, id: InterfaceId) -> InterfaceEntry {
        match self.interfaces.remove(&id) {
            Some(entry) => entry,
            None => panic!("unknown interface {id} removed"),
        }
    }
}
