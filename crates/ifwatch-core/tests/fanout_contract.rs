//! Contract Test: Event Fan-out
//!
//! Every live watcher receives the events the loop generates, in the order
//! it generated them, with no redundant `Changed` events.
//!
//! Constraints verified:
//! - Interface lifecycle scenario end to end
//! - Default-route changes without an actual difference are suppressed
//! - Route/online changes for unknown interfaces are ignored
//! - Independent watchers observe identical ordering

mod common;

use common::*;
use ifwatch_core::{
    AddressRecord, AddressRemovalReason, Event, InterfaceId, PropertiesDelta, WatcherOptions,
};

#[tokio::test]
async fn interface_lifecycle_scenario() {
    let harness = Harness::start();
    let (proxy, _) = harness.primed_watcher(WatcherOptions::default()).await;
    let x = InterfaceId(5);
    let a = subnet("192.168.0.1/16");

    harness.changes.interface_added(test_properties(5)).unwrap();
    match next_event(&proxy).await {
        Event::Added(properties) => {
            assert_eq!(properties.id, x);
            assert!(properties.addresses.is_empty());
        }
        other => panic!("expected added, got {other:?}"),
    }

    harness.changes.online_changed(x, true).unwrap();
    assert_eq!(
        next_event(&proxy).await,
        Event::Changed(PropertiesDelta::new(x).with_online(true))
    );

    harness
        .changes
        .address_changed(x, a, AddressRecord::assigned())
        .unwrap();
    let addresses = changed(next_event(&proxy).await).addresses.expect("address list");
    let addrs: Vec<_> = addresses.iter().map(|a| a.addr).collect();
    assert_eq!(addrs, vec![a]);

    harness
        .changes
        .address_removed(x, a, AddressRemovalReason::ManualAction)
        .unwrap();
    let delta = changed(next_event(&proxy).await);
    assert_eq!(delta.id, x);
    assert_eq!(delta.addresses, Some(Vec::new()));

    harness.changes.interface_removed(x).unwrap();
    assert_eq!(next_event(&proxy).await, Event::Removed(x));

    harness.shutdown().await.unwrap();
}

#[tokio::test]
async fn redundant_default_route_changes_are_suppressed() {
    let harness = Harness::start();
    let id = InterfaceId(1);
    harness.changes.interface_added(test_properties(1)).unwrap();
    let (proxy, _) = harness.primed_watcher(WatcherOptions::default()).await;

    harness.changes.default_route_changed(id, Some(true), None).unwrap();
    let delta = changed(next_event(&proxy).await);
    assert_eq!(delta.has_default_ipv4_route, Some(true));
    assert_eq!(delta.has_default_ipv6_route, None);

    // Neither of these differs from the stored state.
    harness.changes.default_route_changed(id, Some(true), None).unwrap();
    harness.changes.default_route_changed(id, Some(true), Some(false)).unwrap();
    harness.changes.default_route_changed(id, None, None).unwrap();

    // Only the part that differs is reported.
    harness.changes.default_route_changed(id, Some(true), Some(true)).unwrap();
    let delta = changed(next_event(&proxy).await);
    assert_eq!(delta.has_default_ipv4_route, None);
    assert_eq!(delta.has_default_ipv6_route, Some(true));

    harness.shutdown().await.unwrap();
}

#[tokio::test]
async fn changes_for_unknown_interfaces_are_ignored() {
    let harness = Harness::start();
    harness.changes.interface_added(test_properties(1)).unwrap();
    let (proxy, _) = harness.primed_watcher(WatcherOptions::default()).await;

    harness
        .changes
        .default_route_changed(InterfaceId(99), Some(true), Some(true))
        .unwrap();
    harness.changes.online_changed(InterfaceId(99), true).unwrap();
    harness.changes.online_changed(InterfaceId(1), true).unwrap();

    assert_eq!(
        next_event(&proxy).await,
        Event::Changed(PropertiesDelta::new(InterfaceId(1)).with_online(true))
    );

    harness.shutdown().await.unwrap();
}

#[tokio::test]
async fn watchers_observe_identical_order() {
    let harness = Harness::start();
    let (first, _) = harness.primed_watcher(WatcherOptions::default()).await;
    let (second, _) = harness.primed_watcher(WatcherOptions::default()).await;

    for id in 1..=3 {
        harness.changes.interface_added(test_properties(id)).unwrap();
        harness.changes.online_changed(InterfaceId(id), true).unwrap();
    }
    harness.changes.interface_removed(InterfaceId(2)).unwrap();

    let mut seen = [Vec::new(), Vec::new()];
    for (proxy, seen) in [&first, &second].into_iter().zip(seen.iter_mut()) {
        for _ in 0..7 {
            seen.push(next_event(proxy).await);
        }
    }
    assert_eq!(seen[0], seen[1]);
    assert_eq!(seen[0][6], Event::Removed(InterfaceId(2)));

    harness.shutdown().await.unwrap();
}

#[tokio::test]
async fn removed_interface_id_can_be_reused() {
    let harness = Harness::start();
    let (proxy, _) = harness.primed_watcher(WatcherOptions::default()).await;

    harness.changes.interface_added(test_properties(1)).unwrap();
    harness
        .changes
        .address_changed(InterfaceId(1), subnet("10.0.0.1/8"), AddressRecord::assigned())
        .unwrap();
    harness.changes.interface_removed(InterfaceId(1)).unwrap();
    harness.changes.interface_added(test_properties(1)).unwrap();

    for _ in 0..3 {
        next_event(&proxy).await;
    }
    match next_event(&proxy).await {
        Event::Added(properties) => assert_eq!(properties.id, InterfaceId(1)),
        other => panic!("expected added, got {other:?}"),
    }

    // The new incarnation starts without addresses.
    let (_late, existing) = harness.primed_watcher(WatcherOptions::default()).await;
    assert!(existing[0].addresses.is_empty());

    harness.shutdown().await.unwrap();
}
