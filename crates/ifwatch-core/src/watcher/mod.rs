//! Watcher: per-observer queue and pull protocol
//!
//! ## Queue discipline
//!
//! The event loop appends with [`Watcher::on_event`], which never blocks.
//! A watcher whose queue already holds `capacity` events is considered
//! unresponsive: it is closed and the event is dropped.
//!
//! ## Pull discipline
//!
//! At most one [`Watcher::watch`] may be outstanding. A second concurrent
//! pull fails with [`Error::WatchPending`] and closes the watcher, which in
//! turn fails the outstanding pull. Dropping a pending `watch` future
//! withdraws the pull without losing anything.
//!
//! The wakeup is a [`Notify`]: at most one permit is stored, so redundant
//! wakeups coalesce. A woken pull always re-checks the queue.

mod endpoint;

pub use endpoint::{WatcherProxy, WatcherServerEnd, watcher_endpoints};
pub(crate) use endpoint::serve;

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::classify::{AddressPropertiesInterest, ChangedAddressProperties, is_visible};
use crate::config::WatcherOptions;
use crate::error::{CloseReason, Error, Result};
use crate::model::{Address, Event, InterfaceId, Properties, PropertiesDelta};

/// Identifier the event loop assigns to each admitted watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WatcherId(pub u64);

impl fmt::Display for WatcherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Default)]
struct QueueState {
    is_hanging: bool,
    queue: VecDeque<Event>,
    close_reason: Option<CloseReason>,
}

/// One observer's session
#[derive(Debug)]
pub struct Watcher {
    id: WatcherId,
    options: WatcherOptions,
    capacity: usize,
    cancel: CancellationToken,
    ready: Notify,
    state: Mutex<QueueState>,
}

impl Watcher {
    /// Creates a watcher
    ///
    /// # Parameters
    ///
    /// * `id` - Identifier used in logs and by the event loop
    /// * `options` - Interest filter
    /// * `capacity` - Unconsumed events tolerated before closing
    /// * `cancel` - Serving context; cancelling it closes the watcher
    pub fn new(
        id: WatcherId,
        options: WatcherOptions,
        capacity: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            options,
            capacity,
            cancel,
            ready: Notify::new(),
            state: Mutex::new(QueueState::default()),
        }
    }

    pub fn id(&self) -> WatcherId {
        self.id
    }

    pub fn options(&self) -> &WatcherOptions {
        &self.options
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Number of events waiting to be pulled
    pub fn queue_len(&self) -> usize {
        self.lock().queue.len()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Closes the watcher, recording the first reason given
    pub fn close(&self, reason: CloseReason) {
        self.lock().close_reason.get_or_insert(reason);
        self.cancel.cancel();
    }

    /// Resolves once the watcher is closed
    pub async fn closed(&self) {
        self.cancel.cancelled().await
    }

    /// Why the watcher was closed, if it was closed with a reason
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.lock().close_reason
    }

    /// The error a pull on this closed watcher reports
    pub(crate) fn closed_error(&self) -> Error {
        Error::closed(self.close_reason().unwrap_or(CloseReason::Shutdown))
    }

    /// Appends an event, closing the watcher instead if it fell behind
    pub fn on_event(&self, event: Event) {
        self.enqueue(event);
    }

    /// Returns false once the watcher is closed
    fn enqueue(&self, event: Event) -> bool {
        if self.is_closed() {
            return false;
        }

        let mut state = self.lock();
        let queue_len = state.queue.len();
        if queue_len >= self.capacity {
            drop(state);
            error!(
                watcher = %self.id,
                queue_len,
                max = self.capacity,
                "too many unconsumed events (client may not be calling watch as frequently as possible)"
            );
            self.close(CloseReason::QueueOverflow);
            return false;
        }
        state.queue.push_back(event);
        let is_hanging = state.is_hanging;
        drop(state);

        if is_hanging {
            self.ready.notify_one();
        }
        true
    }

    /// Puts back an event a pull took but could not hand over
    ///
    /// The event was already counted against capacity when it was first
    /// enqueued, so no capacity check applies.
    pub(crate) fn requeue_front(&self, event: Event) {
        if self.is_closed() {
            return;
        }
        let mut state = self.lock();
        state.queue.push_front(event);
        let is_hanging = state.is_hanging;
        drop(state);

        if is_hanging {
            self.ready.notify_one();
        }
    }

    /// Seeds a new watcher with one `Existing` per interface followed by
    /// `Idle`
    ///
    /// Addresses are filtered per this watcher's interest. Priming counts
    /// against capacity like any other event: a snapshot that does not fit
    /// closes the watcher with [`CloseReason::QueueOverflow`].
    pub fn prime(&self, interfaces: impl IntoIterator<Item = Properties>) {
        let existing = interfaces.into_iter().map(|mut properties| {
            properties.addresses = self.filter_addresses(&properties.addresses);
            Event::Existing(properties)
        });
        for event in existing.chain(std::iter::once(Event::Idle)) {
            if !self.enqueue(event) {
                return;
            }
        }
    }

    /// Visible addresses with unsubscribed properties cleared
    ///
    /// Returns new values; `addresses` is left untouched.
    pub fn filter_addresses(&self, addresses: &[Address]) -> Vec<Address> {
        let interest = self.options.address_properties_interest;
        let include_non_assigned = self.options.include_non_assigned_addresses;
        addresses
            .iter()
            .filter(|address| is_visible(address.assignment_state, include_non_assigned))
            .map(|address| {
                let mut address = address.clone();
                if !interest.contains(AddressPropertiesInterest::VALID_UNTIL) {
                    address.valid_until = None;
                }
                if !interest.contains(AddressPropertiesInterest::PREFERRED_LIFETIME_INFO) {
                    address.preferred_lifetime_info = None;
                }
                address
            })
            .collect()
    }

    /// Enqueues a `Changed` carrying this watcher's view of `addresses`,
    /// if the transition is of interest to it
    pub fn on_addresses_changed(
        &self,
        id: InterfaceId,
        addresses: &[Address],
        changes: ChangedAddressProperties,
    ) {
        if !changes.any_of_interest(
            self.options.include_non_assigned_addresses,
            self.options.address_properties_interest,
        ) {
            return;
        }
        let delta = PropertiesDelta::new(id).with_addresses(self.filter_addresses(addresses));
        self.on_event(Event::Changed(delta));
    }

    /// Pulls the next event, waiting until one is available
    ///
    /// # Errors
    ///
    /// * [`Error::WatchPending`] if another pull is outstanding
    /// * [`Error::WatcherClosed`] once the watcher is closed
    pub async fn watch(&self) -> Result<Event> {
        {
            let mut state = self.lock();
            if state.is_hanging {
                state.close_reason.get_or_insert(CloseReason::PendingWatch);
                drop(state);
                self.cancel.cancel();
                return Err(Error::WatchPending);
            }
        }

        loop {
            {
                let mut state = self.lock();
                if self.cancel.is_cancelled() {
                    return Err(Error::closed(
                        state.close_reason.unwrap_or(CloseReason::Shutdown),
                    ));
                }
                if let Some(event) = state.queue.pop_front() {
                    if state.queue.is_empty() {
                        // Release storage grown during a burst.
                        state.queue = VecDeque::new();
                    }
                    return Ok(event);
                }
                state.is_hanging = true;
            }

            // Cleared on wakeup, or when the caller abandons the pull.
            let _hanging = Hanging(self);
            tokio::select! {
                _ = self.ready.notified() => {}
                _ = self.cancel.cancelled() => {}
            }
        }
    }
}

/// Marks a pull as outstanding until dropped
struct Hanging<'a>(&'a Watcher);

impl Drop for Hanging<'_> {
    fn drop(&mut self) {
        self.0.lock().is_hanging = false;
    }
}
