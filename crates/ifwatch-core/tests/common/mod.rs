//! Harness and fixtures for contract tests
//!
//! Every test runs the real event loop fed by a [`ChannelSource`]. Tests
//! run on the current-thread runtime, where [`Harness::barrier`] orders the
//! test against the loop: once it returns, every notification submitted
//! before it has been applied and fanned out.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use ifwatch_core::{
    AddressRecord, AssignmentState, ChangeSender, ChannelSource, DevicePortClass, Event,
    EventLoop, EventLoopConfig, InterfaceId, InterfaceState, PortClass, Properties, Result,
    Subnet, Timestamp, WatcherOptions, WatcherProxy, WatcherStats,
};
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::timeout;

/// Upper bound for any single await in a test
pub const STEP: Duration = Duration::from_secs(2);

/// A running event loop and the handles to drive it
pub struct Harness {
    pub changes: ChangeSender,
    pub state: InterfaceState,
    pub stats: Arc<WatcherStats>,
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<Result<()>>,
}

impl Harness {
    pub fn start() -> Self {
        Self::start_with(EventLoopConfig::default())
    }

    pub fn start_with(config: EventLoopConfig) -> Self {
        let (source, changes) = ChannelSource::new();
        let (event_loop, state) =
            EventLoop::new(Box::new(source), config).expect("event loop construction succeeds");
        let stats = event_loop.stats();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(event_loop.run_with_shutdown(shutdown_rx));

        Self {
            changes,
            state,
            stats,
            shutdown_tx,
            handle,
        }
    }

    /// Register a watcher without pulling anything
    pub async fn watcher(&self, options: WatcherOptions) -> WatcherProxy {
        self.state
            .get_watcher(options)
            .await
            .expect("registration succeeds")
    }

    /// Register a watcher and consume its priming sequence
    ///
    /// Returns the proxy and the `Existing` payloads in delivery order.
    pub async fn primed_watcher(&self, options: WatcherOptions) -> (WatcherProxy, Vec<Properties>) {
        let proxy = self.watcher(options).await;
        let mut existing = Vec::new();
        loop {
            match next_event(&proxy).await {
                Event::Existing(properties) => existing.push(properties),
                Event::Idle => return (proxy, existing),
                other => panic!("unexpected event while priming: {other:?}"),
            }
        }
    }

    /// Wait until the loop has applied everything submitted so far
    pub async fn barrier(&self) {
        let (proxy, _) = self.primed_watcher(WatcherOptions::default()).await;
        drop(proxy);
    }

    /// Stop the loop and wait for it to drain
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown_tx.send(());
        timeout(STEP, self.handle)
            .await
            .expect("event loop stops in time")
            .expect("event loop task does not panic")
    }

    /// Wait for the loop task to end on its own
    pub async fn finished(self) -> std::result::Result<Result<()>, JoinError> {
        let Self {
            shutdown_tx, handle, ..
        } = self;
        let result = timeout(STEP, handle).await.expect("event loop ends in time");
        drop(shutdown_tx);
        result
    }
}

/// Pull the next event, failing the test on error or timeout
pub async fn next_event(proxy: &WatcherProxy) -> Event {
    next_result(proxy).await.expect("watch succeeds")
}

pub async fn next_result(proxy: &WatcherProxy) -> Result<Event> {
    timeout(STEP, proxy.watch()).await.expect("watch completes in time")
}

/// A pull running in its own task
///
/// Abandoning a pull mid-flight would leave it outstanding on the watcher,
/// so tests that need to observe "nothing arrived" hold one of these.
pub struct PendingPull {
    handle: JoinHandle<Result<Event>>,
}

impl PendingPull {
    pub fn start(proxy: &WatcherProxy) -> Self {
        let proxy = proxy.clone();
        Self {
            handle: tokio::spawn(async move { proxy.watch().await }),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub async fn result(self) -> Result<Event> {
        timeout(STEP, self.handle)
            .await
            .expect("pull completes in time")
            .expect("pull task does not panic")
    }
}

/// Poll the live-watcher counter until it reaches `want`
pub async fn wait_for_live(stats: &WatcherStats, want: i64) {
    timeout(STEP, async {
        while stats.live_watchers() != want {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| {
        panic!(
            "live watchers stuck at {} (want {want})",
            stats.live_watchers()
        )
    });
}

/// Let spawned serving tasks run
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

pub fn test_properties(id: u64) -> Properties {
    Properties::new(
        InterfaceId(id),
        format!("testif{id:02}"),
        PortClass::Device(DevicePortClass::Ethernet),
    )
}

pub fn subnet(s: &str) -> Subnet {
    s.parse().expect("valid subnet")
}

pub fn record(state: AssignmentState) -> AddressRecord {
    AddressRecord::new(state)
}

pub fn at_hours(hours: u64) -> Timestamp {
    Timestamp::after_boot(Duration::from_secs(hours * 3600))
}

pub fn changed(event: Event) -> ifwatch_core::PropertiesDelta {
    match event {
        Event::Changed(delta) => delta,
        other => panic!("expected a changed event, got {other:?}"),
    }
}
