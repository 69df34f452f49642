//! Registration Gateway
//!
//! Callers ask for watchers through [`InterfaceState`]; the request is
//! queued for the event loop, which admits it on its own thread of
//! control. Callers never touch loop state.

use tokio::sync::mpsc;

use crate::config::WatcherOptions;
use crate::error::{Error, Result};
use crate::watcher::{WatcherProxy, WatcherServerEnd, watcher_endpoints};

/// A request to bind a new watcher to `server_end`
#[derive(Debug)]
pub struct WatcherRequest {
    pub options: WatcherOptions,
    pub server_end: WatcherServerEnd,
}

/// Cloneable handle for registering watchers with a running event loop
#[derive(Debug, Clone)]
pub struct InterfaceState {
    requests: mpsc::Sender<WatcherRequest>,
}

impl InterfaceState {
    pub(crate) fn new(requests: mpsc::Sender<WatcherRequest>) -> Self {
        Self { requests }
    }

    /// Forwards a registration to the event loop
    ///
    /// Waits only for room in the registration queue, not for admission.
    pub async fn register(&self, options: WatcherOptions, server_end: WatcherServerEnd) -> Result<()> {
        self.requests
            .send(WatcherRequest {
                options,
                server_end,
            })
            .await
            .map_err(|_| Error::LoopClosed)
    }

    /// Registers a new watcher and returns its consumer handle
    pub async fn get_watcher(&self, options: WatcherOptions) -> Result<WatcherProxy> {
        let (proxy, server_end) = watcher_endpoints();
        self.register(options, server_end).await?;
        Ok(proxy)
    }
}
