//! Addresses, their lifetimes and assignment state

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

/// An instant on the boot clock, in nanoseconds
///
/// `Timestamp::INFINITE` stands for "never".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    pub const INFINITE: Timestamp = Timestamp(i64::MAX);

    pub const fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    /// Instant `after` the start of the boot clock, saturating at infinity
    pub fn after_boot(after: Duration) -> Self {
        i64::try_from(after.as_nanos()).map_or(Self::INFINITE, Self)
    }

    pub const fn nanos(self) -> i64 {
        self.0
    }

    pub const fn is_infinite(self) -> bool {
        self.0 == i64::MAX
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::INFINITE
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_infinite() {
            return f.write_str("infinite");
        }
        let sign = if self.0 < 0 { '-' } else { '+' };
        write!(f, "boot{sign}{:?}", Duration::from_nanos(self.0.unsigned_abs()))
    }
}

/// An address together with its prefix length
///
/// Host bits are kept. Ordering puts every IPv4 subnet before every IPv6
/// subnet; within a family addresses compare bytewise and ties break on
/// the prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Subnet {
    addr: IpAddr,
    prefix_len: u8,
}

impl Subnet {
    pub fn new(addr: IpAddr, prefix_len: u8) -> Result<Self, Error> {
        let max = match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        if prefix_len > max {
            return Err(Error::invalid_input(format!(
                "prefix length {prefix_len} exceeds {max} for {addr}"
            )));
        }
        Ok(Self { addr, prefix_len })
    }

    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix_len)
    }
}

impl FromStr for Subnet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, prefix_len) = s
            .split_once('/')
            .ok_or_else(|| Error::invalid_input(format!("subnet {s:?} is missing a prefix length")))?;
        let addr: IpAddr = addr
            .parse()
            .map_err(|e| Error::invalid_input(format!("subnet {s:?}: {e}")))?;
        let prefix_len: u8 = prefix_len
            .parse()
            .map_err(|e| Error::invalid_input(format!("subnet {s:?}: {e}")))?;
        Self::new(addr, prefix_len)
    }
}

impl Serialize for Subnet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Subnet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Duplicate address detection / availability state of an address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentState {
    Tentative,
    Assigned,
    Disabled,
}

impl AssignmentState {
    pub fn is_assigned(self) -> bool {
        match self {
            AssignmentState::Assigned => true,
            AssignmentState::Tentative | AssignmentState::Disabled => false,
        }
    }
}

impl fmt::Display for AssignmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AssignmentState::Tentative => "tentative",
            AssignmentState::Assigned => "assigned",
            AssignmentState::Disabled => "disabled",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferredLifetimeInfo {
    Deprecated,
    PreferredUntil(Timestamp),
}

impl Default for PreferredLifetimeInfo {
    fn default() -> Self {
        PreferredLifetimeInfo::PreferredUntil(Timestamp::INFINITE)
    }
}

impl fmt::Display for PreferredLifetimeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreferredLifetimeInfo::Deprecated => f.write_str("deprecated"),
            PreferredLifetimeInfo::PreferredUntil(until) => until.fmt(f),
        }
    }
}

/// What the network stack knows about one address on one interface
///
/// Replaced wholesale by every address-changed notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRecord {
    pub assignment_state: AssignmentState,
    #[serde(default)]
    pub valid_until: Timestamp,
    #[serde(default)]
    pub preferred_lifetime: PreferredLifetimeInfo,
}

impl AddressRecord {
    /// A record in `state` with infinite lifetimes
    pub fn new(assignment_state: AssignmentState) -> Self {
        Self {
            assignment_state,
            valid_until: Timestamp::INFINITE,
            preferred_lifetime: PreferredLifetimeInfo::default(),
        }
    }

    pub fn assigned() -> Self {
        Self::new(AssignmentState::Assigned)
    }

    pub fn with_valid_until(mut self, valid_until: Timestamp) -> Self {
        self.valid_until = valid_until;
        self
    }

    pub fn with_preferred_lifetime(mut self, preferred_lifetime: PreferredLifetimeInfo) -> Self {
        self.preferred_lifetime = preferred_lifetime;
        self
    }
}

/// An address as delivered to watchers
///
/// Lifetime fields the watcher did not subscribe to are `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub addr: Subnet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_lifetime_info: Option<PreferredLifetimeInfo>,
    pub assignment_state: AssignmentState,
}

impl Address {
    /// Fully populated address built from the stored record
    pub fn from_record(addr: Subnet, record: &AddressRecord) -> Self {
        Self {
            addr,
            valid_until: Some(record.valid_until),
            preferred_lifetime_info: Some(record.preferred_lifetime),
            assignment_state: record.assignment_state,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{addr: {}", self.addr)?;
        if let Some(valid_until) = self.valid_until {
            write!(f, ", valid_until: {valid_until}")?;
        }
        if let Some(info) = self.preferred_lifetime_info {
            write!(f, ", preferred_lifetime_info: {info}")?;
        }
        write!(f, ", state: {}}}", self.assignment_state)
    }
}
