//! In-process change source backed by an unbounded channel
//!
//! Producers living in the same process (link monitors, address
//! configuration, routing) hold a [`ChangeSender`] and report transitions
//! without ever waiting on the event loop.

use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::warn;

use crate::error::{Error, Result};
use crate::model::{AddressRecord, AddressRemovalReason, InterfaceChange, InterfaceId, Properties, Subnet};
use crate::traits::{ChangeSource, ChangeStream};

/// Producer handle of a [`ChannelSource`]
#[derive(Debug, Clone)]
pub struct ChangeSender {
    tx: mpsc::UnboundedSender<InterfaceChange>,
}

impl ChangeSender {
    /// Submit a notification
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Queued for the event loop
    /// - `Err(Error::LoopClosed)`: The event loop is gone
    pub fn send(&self, change: InterfaceChange) -> Result<()> {
        self.tx.send(change).map_err(|_| Error::LoopClosed)
    }

    pub fn interface_added(&self, properties: Properties) -> Result<()> {
        self.send(InterfaceChange::InterfaceAdded(properties))
    }

    pub fn interface_removed(&self, id: InterfaceId) -> Result<()> {
        self.send(InterfaceChange::InterfaceRemoved { id })
    }

    pub fn default_route_changed(
        &self,
        id: InterfaceId,
        has_default_ipv4_route: Option<bool>,
        has_default_ipv6_route: Option<bool>,
    ) -> Result<()> {
        self.send(InterfaceChange::DefaultRouteChanged {
            id,
            has_default_ipv4_route,
            has_default_ipv6_route,
        })
    }

    pub fn online_changed(&self, id: InterfaceId, online: bool) -> Result<()> {
        self.send(InterfaceChange::OnlineChanged { id, online })
    }

    pub fn address_changed(&self, id: InterfaceId, addr: Subnet, record: AddressRecord) -> Result<()> {
        self.send(InterfaceChange::AddressChanged { id, addr, record })
    }

    pub fn address_removed(
        &self,
        id: InterfaceId,
        addr: Subnet,
        reason: AddressRemovalReason,
    ) -> Result<()> {
        self.send(InterfaceChange::AddressRemoved { id, addr, reason })
    }
}

/// Change source fed through [`ChangeSender`] handles
#[derive(Debug)]
pub struct ChannelSource {
    rx: Option<mpsc::UnboundedReceiver<InterfaceChange>>,
}

impl ChannelSource {
    pub fn new() -> (Self, ChangeSender) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx: Some(rx) }, ChangeSender { tx })
    }
}

impl ChangeSource for ChannelSource {
    fn watch(&mut self) -> ChangeStream {
        match self.rx.take() {
            Some(rx) => Box::pin(UnboundedReceiverStream::new(rx)),
            None => {
                warn!("channel change source watched twice; second stream is empty");
                Box::pin(tokio_stream::empty::<InterfaceChange>())
            }
        }
    }

    fn name(&self) -> &'static str {
        "channel"
    }
}
