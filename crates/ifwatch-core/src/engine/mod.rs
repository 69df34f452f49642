//! Interface watcher event loop
//!
//! The EventLoop is responsible for:
//! - Applying state-change notifications to the property store
//! - Fanning the resulting events out to every live watcher
//! - Admitting watchers and priming them with a snapshot
//! - Removing watchers once their serving task ends
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐                      ┌───────────────────┐
//! │ ChangeSource │── InterfaceChange ─┐ │ InterfaceState    │
//! └──────────────┘                    │ └───────────────────┘
//!                                     │           │ WatcherRequest
//!                                     ▼           ▼
//!                            ┌─────────────────────────┐
//!                            │        EventLoop        │
//!                            │  (owns PropertyStore)   │
//!                            └─────────────────────────┘
//!                                     │ Event
//!         ┌───────────────────────────┼───────────────────────────┐
//!         ▼                           ▼                           ▼
//! ┌─────────────┐           ┌─────────────┐           ┌─────────────┐
//! │  Watcher    │           │  Watcher    │           │  Watcher    │
//! │ (serve task)│           │ (serve task)│           │ (serve task)│
//! └─────────────┘           └─────────────┘           └─────────────┘
//! ```
//!
//! ## Input priority
//!
//! Each turn handles exactly one input, checked in this order: shutdown,
//! finished serving tasks, state changes, registrations. A registration is
//! therefore only admitted once every notification submitted before it
//! has been applied.

use std::collections::HashMap;
use std::future::Future;
use std::panic;
use std::pin::pin;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinSet};
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::classify::{AddressPropertiesInterest, added_removed_change_type, addresses_change_type};
use crate::config::EventLoopConfig;
use crate::error::Result;
use crate::gateway::{InterfaceState, WatcherRequest};
use crate::model::{Event, InterfaceChange, Properties};
use crate::stats::WatcherStats;
use crate::store::{InterfaceEntry, PropertyStore};
use crate::traits::ChangeSource;
use crate::watcher::{self, Watcher, WatcherId};

/// Single serialization point for interface state
///
/// ## Lifecycle
///
/// 1. Create with [`EventLoop::new()`], keeping the returned
///    [`InterfaceState`] to register watchers
/// 2. Start with [`EventLoop::run()`] or one of its variants
/// 3. The loop runs until its shutdown signal fires, then waits for every
///    watcher's serving task to finish before returning
///
/// ## Threading
///
/// All store mutation and fan-out happens on the task running the loop.
/// Each watcher is served by its own task.
pub struct EventLoop {
    config: EventLoopConfig,

    /// Producer of state-change notifications
    source: Box<dyn ChangeSource>,

    /// Registration gateway receiver
    registrations: mpsc::Receiver<WatcherRequest>,

    store: PropertyStore,

    /// Live watchers, keyed by id
    watchers: HashMap<WatcherId, Arc<Watcher>>,

    /// Serving tasks; each yields its watcher's id when done
    tasks: JoinSet<WatcherId>,

    stats: Arc<WatcherStats>,

    /// Parent of every watcher's serving context
    shutdown: CancellationToken,

    next_id: u64,
}

impl EventLoop {
    /// Create a new event loop
    ///
    /// # Parameters
    ///
    /// - `source`: Producer of state-change notifications
    /// - `config`: Event loop configuration
    ///
    /// # Returns
    ///
    /// A tuple of (event_loop, interface_state) where interface_state
    /// registers watchers with this loop
    pub fn new(
        source: Box<dyn ChangeSource>,
        config: EventLoopConfig,
    ) -> Result<(Self, InterfaceState)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.registration_channel_capacity);

        let event_loop = Self {
            config,
            source,
            registrations: rx,
            store: PropertyStore::new(),
            watchers: HashMap::new(),
            tasks: JoinSet::new(),
            stats: Arc::new(WatcherStats::new()),
            shutdown: CancellationToken::new(),
            next_id: 0,
        };

        Ok((event_loop, InterfaceState::new(tx)))
    }

    /// Diagnostics counters, readable while the loop runs
    pub fn stats(&self) -> Arc<WatcherStats> {
        Arc::clone(&self.stats)
    }

    /// Run until Ctrl-C
    pub async fn run(self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for ctrl-c, stopping");
            }
        })
        .await
    }

    /// Run until `shutdown_rx` fires or its sender is dropped
    pub async fn run_with_shutdown(self, shutdown_rx: oneshot::Receiver<()>) -> Result<()> {
        self.run_until(async {
            let _ = shutdown_rx.await;
        })
        .await
    }

    /// Run until `shutdown` completes
    ///
    /// Returns once every watcher's serving task has finished.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let mut shutdown = pin!(shutdown);
        let mut changes = self.source.watch();
        let mut source_open = true;
        let mut gateway_open = true;

        info!(source = self.source.name(), "starting interface watcher event loop");

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("stopping interface watcher event loop");
                    break;
                }

                Some(joined) = self.tasks.join_next() => self.on_task_joined(joined),

                change = changes.next(), if source_open => match change {
                    Some(change) => self.handle_change(change),
                    None => {
                        debug!(source = self.source.name(), "change source exhausted");
                        source_open = false;
                    }
                },

                request = self.registrations.recv(), if gateway_open => match request {
                    Some(request) => self.register_watcher(request),
                    None => {
                        debug!("registration gateway closed");
                        gateway_open = false;
                    }
                },
            }
        }

        // No serving task may outlive the loop.
        self.shutdown.cancel();
        while let Some(joined) = self.tasks.join_next().await {
            self.on_task_joined(joined);
        }

        info!("interface watcher event loop stopped");
        Ok(())
    }

    /// Apply one notification and fan out the result
    ///
    /// # Panics
    ///
    /// On producer contract violations.
    fn handle_change(&mut self, change: InterfaceChange) {
        match change {
            InterfaceChange::InterfaceAdded(properties) => {
                self.store.insert(properties.clone());
                // Added events always carry an explicitly empty address list.
                self.broadcast(Event::Added(Properties {
                    addresses: Vec::new(),
                    ..properties
                }));
            }
            InterfaceChange::InterfaceRemoved { id } => {
                info!(interface = %id, "interface removed");
                self.store.remove(id);
                self.broadcast(Event::Removed(id));
            }
            InterfaceChange::DefaultRouteChanged {
                id,
                has_default_ipv4_route,
                has_default_ipv6_route,
            } => {
                info!(
                    interface = %id,
                    ipv4 = ?has_default_ipv4_route,
                    ipv6 = ?has_default_ipv6_route,
                    "default route changed"
                );
                // May race interface removal.
                let Some(entry) = self.store.get_mut(id) else {
                    warn!(interface = %id, "default route changed notification for unknown interface");
                    return;
                };
                if let Some(delta) = entry.apply_default_routes(has_default_ipv4_route, has_default_ipv6_route) {
                    self.broadcast(Event::Changed(delta));
                }
            }
            InterfaceChange::OnlineChanged { id, online } => {
                info!(interface = %id, online, "online changed");
                // May race interface removal.
                let Some(entry) = self.store.get_mut(id) else {
                    warn!(interface = %id, "online changed notification for unknown interface");
                    return;
                };
                let delta = entry.apply_online(online);
                self.broadcast(Event::Changed(delta));
            }
            InterfaceChange::AddressChanged { id, addr, record } => {
                let entry = self.store.known_mut(id, "address changed");
                let prev = entry.upsert_address(addr, record);
                let addresses = entry.addresses();

                // Lifetime refreshes are frequent; only log what matters.
                if prev.is_none_or(|prev| prev.assignment_state != record.assignment_state) {
                    info!(
                        interface = %id,
                        %addr,
                        state = %record.assignment_state,
                        valid_until = %record.valid_until,
                        preferred_lifetime = %record.preferred_lifetime,
                        "address changed"
                    );
                }

                let changes = addresses_change_type(prev.as_ref(), &record);
                if !changes.any_of_interest(true, AddressPropertiesInterest::ALL) {
                    return;
                }
                for watcher in self.watchers.values() {
                    watcher.on_addresses_changed(id, &addresses, changes);
                }
            }
            InterfaceChange::AddressRemoved { id, addr, reason } => {
                info!(interface = %id, %addr, %reason, "address removed");
                let entry = self.store.known_mut(id, "address removed");
                let record = entry.remove_address(&addr);
                let addresses = entry.addresses();

                let changes = added_removed_change_type(&record);
                for watcher in self.watchers.values() {
                    watcher.on_addresses_changed(id, &addresses, changes);
                }
            }
        }
    }

    fn broadcast(&self, event: Event) {
        for watcher in self.watchers.values() {
            watcher.on_event(event.clone());
        }
    }

    /// Admit a watcher: prime it within this turn, then start serving it
    fn register_watcher(&mut self, request: WatcherRequest) {
        let WatcherRequest {
            options,
            server_end,
        } = request;

        let id = WatcherId(self.next_id);
        self.next_id += 1;

        let watcher = Arc::new(Watcher::new(
            id,
            options,
            self.config.watcher_queue_capacity,
            self.shutdown.child_token(),
        ));
        watcher.prime(self.store.iter().map(InterfaceEntry::snapshot));

        self.watchers.insert(id, Arc::clone(&watcher));
        self.stats.watcher_added();
        debug!(
            watcher = %id,
            interest = %options.address_properties_interest,
            include_non_assigned = options.include_non_assigned_addresses,
            live = self.stats.live_watchers(),
            "watcher registered"
        );

        self.tasks.spawn(watcher::serve(watcher, server_end));
    }

    fn on_task_joined(&mut self, joined: std::result::Result<WatcherId, JoinError>) {
        match joined {
            Ok(id) => {
                if self.watchers.remove(&id).is_some() {
                    self.stats.watcher_removed();
                    debug!(watcher = %id, live = self.stats.live_watchers(), "watcher removed");
                }
            }
            Err(e) if e.is_panic() => panic::resume_unwind(e.into_panic()),
            Err(e) => error!(error = %e, "watcher serving task failed"),
        }
    }
}
