//! Consumer-facing endpoints of a watcher and the task serving them

use std::panic;
use std::sync::{Arc, OnceLock};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::{Watcher, WatcherId};
use crate::error::{CloseReason, Error, Result};
use crate::model::Event;

#[derive(Debug)]
pub(crate) struct WatchRequest {
    responder: oneshot::Sender<Result<Event>>,
}

/// Consumer handle of a watcher
///
/// Clones share the same watcher. Once every clone is dropped the watcher
/// is closed.
#[derive(Debug, Clone)]
pub struct WatcherProxy {
    requests: mpsc::UnboundedSender<WatchRequest>,
    /// Set by the serving side before it goes away
    close_reason: Arc<OnceLock<CloseReason>>,
}

impl WatcherProxy {
    /// Pulls the next event
    ///
    /// Only one pull may be outstanding across all clones; a second one
    /// fails and closes the watcher.
    ///
    /// # Errors
    ///
    /// Every error is terminal: subsequent pulls fail too, with the same
    /// close reason. Dropping the returned future withdraws the pull.
    pub async fn watch(&self) -> Result<Event> {
        let (responder, response) = oneshot::channel();
        self.requests
            .send(WatchRequest { responder })
            .map_err(|_| self.gone())?;
        response.await.map_err(|_| self.gone())?
    }

    fn gone(&self) -> Error {
        let reason = self
            .close_reason
            .get()
            .copied()
            .unwrap_or(CloseReason::Disconnected);
        Error::closed(reason)
    }

    /// Whether the serving side has gone away
    pub fn is_closed(&self) -> bool {
        self.requests.is_closed()
    }
}

/// Serving half of a watcher connection, handed to the event loop
#[derive(Debug)]
pub struct WatcherServerEnd {
    requests: mpsc::UnboundedReceiver<WatchRequest>,
    close_reason: Arc<OnceLock<CloseReason>>,
}

/// Creates a connected proxy / server-end pair
pub fn watcher_endpoints() -> (WatcherProxy, WatcherServerEnd) {
    let (tx, rx) = mpsc::unbounded_channel();
    let close_reason = Arc::new(OnceLock::new());
    (
        WatcherProxy {
            requests: tx,
            close_reason: Arc::clone(&close_reason),
        },
        WatcherServerEnd {
            requests: rx,
            close_reason,
        },
    )
}

/// Serves pull requests for `watcher` until it is closed
///
/// Requests are handled concurrently so that overlapping pulls reach the
/// watcher and are rejected there. Returns the watcher's id once no pull
/// is left running.
pub(crate) async fn serve(watcher: Arc<Watcher>, server_end: WatcherServerEnd) -> WatcherId {
    let WatcherServerEnd {
        mut requests,
        close_reason,
    } = server_end;
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            biased;

            _ = watcher.closed() => break,

            request = requests.recv() => match request {
                Some(WatchRequest { mut responder }) => {
                    let watcher = Arc::clone(&watcher);
                    in_flight.spawn(async move {
                        let result = tokio::select! {
                            biased;
                            result = watcher.watch() => result,
                            // Abandoned by the consumer; nothing was taken.
                            _ = responder.closed() => return,
                        };
                        if let Err(e) = &result {
                            match e.close_reason() {
                                Some(CloseReason::QueueOverflow | CloseReason::PendingWatch) => {
                                    warn!(watcher = %watcher.id(), error = %e, "watch failed");
                                }
                                _ => debug!(watcher = %watcher.id(), error = %e, "watch ended"),
                            }
                        }
                        // Abandoned after the event was taken: keep it for
                        // the next pull.
                        if let Err(Ok(event)) = responder.send(result) {
                            watcher.requeue_front(event);
                        }
                    });
                }
                None => {
                    watcher.close(CloseReason::PeerClosed);
                    break;
                }
            },

            Some(joined) = in_flight.join_next() => propagate_panic(joined),
        }
    }

    // Closed: every in-flight pull observes it and answers.
    while let Some(joined) = in_flight.join_next().await {
        propagate_panic(joined);
    }

    let _ = close_reason.set(watcher.close_reason().unwrap_or(CloseReason::Shutdown));
    requests.close();
    while let Ok(WatchRequest { responder }) = requests.try_recv() {
        let _ = responder.send(Err(watcher.closed_error()));
    }

    watcher.id()
}

fn propagate_panic(joined: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            panic::resume_unwind(e.into_panic());
        }
    }
}
