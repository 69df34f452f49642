//! Address Classifier
//!
//! Decides whether an address transition is worth waking a watcher for.
//!
//! ## Tiers
//!
//! A transition is first classified by what happened to its assignment
//! state; the lifetime properties that changed are recorded alongside.
//! Each watcher then checks the classification against its own interest:
//!
//! - assigned <-> not assigned: everyone hears about it
//! - not assigned -> differently not assigned: only watchers that see
//!   non-assigned addresses
//! - still assigned: watchers subscribed to one of the changed properties
//! - still not assigned: as above, and only if non-assigned addresses are
//!   visible to the watcher

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::{AddressRecord, AssignmentState, PreferredLifetimeInfo};

bitflags::bitflags! {
    /// A set of address lifetime properties
    ///
    /// Used both for what a watcher subscribes to and for what a transition
    /// changed, so the two can be intersected directly.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct AddressPropertiesInterest: u8 {
        const VALID_UNTIL = 1 << 0;
        const PREFERRED_LIFETIME_INFO = 1 << 1;
        const ALL = Self::VALID_UNTIL.bits() | Self::PREFERRED_LIFETIME_INFO.bits();
    }
}

impl fmt::Display for AddressPropertiesInterest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::with_capacity(2);
        if self.contains(Self::VALID_UNTIL) {
            names.push("valid_until");
        }
        if self.contains(Self::PREFERRED_LIFETIME_INFO) {
            names.push("preferred_lifetime_info");
        }
        if names.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&names.join(","))
        }
    }
}

/// Parses a comma separated list of `valid_until`, `preferred_lifetime_info`,
/// `all` and `none`
impl FromStr for AddressPropertiesInterest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut interest = Self::empty();
        for name in s.split(',').map(str::trim).filter(|name| !name.is_empty()) {
            interest |= match name {
                "valid_until" => Self::VALID_UNTIL,
                "preferred_lifetime_info" => Self::PREFERRED_LIFETIME_INFO,
                "all" => Self::ALL,
                "none" => Self::empty(),
                other => {
                    return Err(Error::invalid_input(format!(
                        "unknown address property {other:?}"
                    )));
                }
            };
        }
        Ok(interest)
    }
}

/// What happened to an address's assignment state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentStateChange {
    /// Moved between assigned and not assigned, either way
    InvolvingAssigned,
    /// Moved between two distinct non-assigned states
    NotInvolvingAssigned,
    UnchangedAtAssigned,
    UnchangedAtNonassigned,
}

/// Classification of a single address transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangedAddressProperties {
    /// Lifetime properties whose value differs; always empty for additions
    /// and removals
    pub properties: AddressPropertiesInterest,
    pub assignment_state: AssignmentStateChange,
}

impl ChangedAddressProperties {
    /// Whether a watcher with the given settings should hear about this
    /// transition
    ///
    /// # Parameters
    ///
    /// * `include_non_assigned` - The watcher sees tentative and disabled
    ///   addresses
    /// * `interest` - The lifetime properties the watcher subscribed to
    pub fn any_of_interest(
        &self,
        include_non_assigned: bool,
        interest: AddressPropertiesInterest,
    ) -> bool {
        match self.assignment_state {
            AssignmentStateChange::InvolvingAssigned => true,
            AssignmentStateChange::NotInvolvingAssigned => include_non_assigned,
            AssignmentStateChange::UnchangedAtNonassigned => {
                include_non_assigned && self.properties.intersects(interest)
            }
            AssignmentStateChange::UnchangedAtAssigned => self.properties.intersects(interest),
        }
    }
}

/// Whether a watcher sees an address in this state at all
pub fn is_visible(state: AssignmentState, include_non_assigned: bool) -> bool {
    include_non_assigned || state.is_assigned()
}

/// Classifies the appearance or disappearance of an address
///
/// The missing end of the transition is treated as an imaginary "not
/// added" state sharing the assignedness of `record`.
pub fn added_removed_change_type(record: &AddressRecord) -> ChangedAddressProperties {
    let assignment_state = if record.assignment_state.is_assigned() {
        AssignmentStateChange::InvolvingAssigned
    } else {
        AssignmentStateChange::NotInvolvingAssigned
    };
    ChangedAddressProperties {
        properties: AddressPropertiesInterest::empty(),
        assignment_state,
    }
}

/// Classifies the transition of an address from `prev` to `next`
///
/// `prev` is `None` when the address was not known before.
pub fn addresses_change_type(
    prev: Option<&AddressRecord>,
    next: &AddressRecord,
) -> ChangedAddressProperties {
    let Some(prev) = prev else {
        return added_removed_change_type(next);
    };

    let mut properties = AddressPropertiesInterest::empty();
    if prev.valid_until != next.valid_until {
        properties |= AddressPropertiesInterest::VALID_UNTIL;
    }
    if preferred_lifetime_changed(prev.preferred_lifetime, next.preferred_lifetime) {
        properties |= AddressPropertiesInterest::PREFERRED_LIFETIME_INFO;
    }

    let assignment_state = if prev.assignment_state == next.assignment_state {
        if next.assignment_state.is_assigned() {
            AssignmentStateChange::UnchangedAtAssigned
        } else {
            AssignmentStateChange::UnchangedAtNonassigned
        }
    } else if prev.assignment_state.is_assigned() || next.assignment_state.is_assigned() {
        AssignmentStateChange::InvolvingAssigned
    } else {
        AssignmentStateChange::NotInvolvingAssigned
    };

    ChangedAddressProperties {
        properties,
        assignment_state,
    }
}

fn preferred_lifetime_changed(prev: PreferredLifetimeInfo, next: PreferredLifetimeInfo) -> bool {
    match (prev, next) {
        (PreferredLifetimeInfo::Deprecated, PreferredLifetimeInfo::Deprecated) => false,
        (PreferredLifetimeInfo::PreferredUntil(a), PreferredLifetimeInfo::PreferredUntil(b)) => {
            a != b
        }
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Timestamp;

    const NONE: AddressPropertiesInterest = AddressPropertiesInterest::empty();
    const VALID: AddressPropertiesInterest = AddressPropertiesInterest::VALID_UNTIL;
    const PREFERRED: AddressPropertiesInterest = AddressPropertiesInterest::PREFERRED_LIFETIME_INFO;
    const ALL: AddressPropertiesInterest = AddressPropertiesInterest::ALL;

    fn record(state: AssignmentState) -> AddressRecord {
        AddressRecord::new(state)
    }

    fn at(nanos: i64) -> Timestamp {
        Timestamp::from_nanos(nanos)
    }

    #[test]
    fn unknown_address_counts_as_added() {
        let got = addresses_change_type(None, &record(AssignmentState::Assigned));
        assert_eq!(got.assignment_state, AssignmentStateChange::InvolvingAssigned);
        assert!(got.properties.is_empty());

        let got = addresses_change_type(None, &record(AssignmentState::Tentative));
        assert_eq!(got.assignment_state, AssignmentStateChange::NotInvolvingAssigned);
        assert!(got.properties.is_empty());
    }

    #[test]
    fn assignment_state_transitions() {
        use AssignmentState::*;
        use AssignmentStateChange::*;

        let cases = [
            (Tentative, Assigned, InvolvingAssigned),
            (Assigned, Disabled, InvolvingAssigned),
            (Disabled, Assigned, InvolvingAssigned),
            (Tentative, Disabled, NotInvolvingAssigned),
            (Disabled, Tentative, NotInvolvingAssigned),
            (Assigned, Assigned, UnchangedAtAssigned),
            (Tentative, Tentative, UnchangedAtNonassigned),
            (Disabled, Disabled, UnchangedAtNonassigned),
        ];
        for (prev, next, want) in cases {
            let got = addresses_change_type(Some(&record(prev)), &record(next));
            assert_eq!(got.assignment_state, want, "{prev} -> {next}");
            assert!(got.properties.is_empty(), "{prev} -> {next}");
        }
    }

    #[test]
    fn lifetime_property_changes() {
        let base = AddressRecord::assigned()
            .with_valid_until(at(100))
            .with_preferred_lifetime(PreferredLifetimeInfo::PreferredUntil(at(50)));

        let valid = base.with_valid_until(at(200));
        assert_eq!(addresses_change_type(Some(&base), &valid).properties, VALID);

        let preferred = base.with_preferred_lifetime(PreferredLifetimeInfo::PreferredUntil(at(60)));
        assert_eq!(addresses_change_type(Some(&base), &preferred).properties, PREFERRED);

        let deprecated = base.with_preferred_lifetime(PreferredLifetimeInfo::Deprecated);
        assert_eq!(addresses_change_type(Some(&base), &deprecated).properties, PREFERRED);
        assert!(
            addresses_change_type(Some(&deprecated), &deprecated)
                .properties
                .is_empty()
        );

        let both = valid.with_preferred_lifetime(PreferredLifetimeInfo::Deprecated);
        assert_eq!(addresses_change_type(Some(&base), &both).properties, ALL);

        assert!(addresses_change_type(Some(&base), &base).properties.is_empty());
    }

    #[test]
    fn interest_by_tier() {
        use AssignmentStateChange::*;

        let change = |assignment_state, properties| ChangedAddressProperties {
            properties,
            assignment_state,
        };

        for include in [false, true] {
            for interest in [NONE, VALID, PREFERRED, ALL] {
                assert!(change(InvolvingAssigned, NONE).any_of_interest(include, interest));
                assert_eq!(
                    change(NotInvolvingAssigned, NONE).any_of_interest(include, interest),
                    include
                );
            }
        }

        assert!(change(UnchangedAtAssigned, VALID).any_of_interest(false, VALID));
        assert!(change(UnchangedAtAssigned, ALL).any_of_interest(false, PREFERRED));
        assert!(!change(UnchangedAtAssigned, VALID).any_of_interest(true, PREFERRED));
        assert!(!change(UnchangedAtAssigned, NONE).any_of_interest(true, ALL));

        assert!(!change(UnchangedAtNonassigned, VALID).any_of_interest(false, ALL));
        assert!(change(UnchangedAtNonassigned, VALID).any_of_interest(true, VALID));
        assert!(!change(UnchangedAtNonassigned, PREFERRED).any_of_interest(true, VALID));
    }

    #[test]
    fn visibility() {
        assert!(is_visible(AssignmentState::Assigned, false));
        assert!(!is_visible(AssignmentState::Tentative, false));
        assert!(!is_visible(AssignmentState::Disabled, false));
        assert!(is_visible(AssignmentState::Disabled, true));
    }

    #[test]
    fn interest_parses_from_list() {
        assert_eq!("".parse::<AddressPropertiesInterest>().unwrap(), NONE);
        assert_eq!("none".parse::<AddressPropertiesInterest>().unwrap(), NONE);
        assert_eq!("valid_until".parse::<AddressPropertiesInterest>().unwrap(), VALID);
        assert_eq!(
            "valid_until, preferred_lifetime_info"
                .parse::<AddressPropertiesInterest>()
                .unwrap(),
            ALL
        );
        assert_eq!("all".parse::<AddressPropertiesInterest>().unwrap(), ALL);
        assert!("lifetime".parse::<AddressPropertiesInterest>().is_err());
        assert_eq!(ALL.to_string(), "valid_until,preferred_lifetime_info");
    }

    #[test]
    fn interest_serializes_as_flag_names() {
        assert_eq!(serde_json::to_string(&VALID).unwrap(), r#""VALID_UNTIL""#);
        let back: AddressPropertiesInterest =
            serde_json::from_str(r#""VALID_UNTIL | PREFERRED_LIFETIME_INFO""#).unwrap();
        assert_eq!(back, ALL);
        assert!(ALL.contains(VALID) && ALL.contains(PREFERRED));
    }
}
