//! Subscriber set for the event stream.
//!
//! Every `GET /events` connection holds a [`Subscription`]; the request
//! consumer pushes each response through [`Broker::broadcast`]. A subscriber
//! whose stream went away is pruned on the next broadcast, and dropping a
//! subscription unregisters it immediately.
//!
//! Each subscriber queue holds at most [`SUBSCRIBER_BUFFER`] frames. A client
//! that stops reading until its queue is full is dropped, which ends its
//! stream.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Frames buffered per subscriber before it is considered stalled.
pub const SUBSCRIBER_BUFFER: usize = 256;

/// One frame queued for a subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A `data:` event carrying serialized JSON.
    Data(Arc<str>),
    /// Final `event: close` frame; the stream ends after it.
    Close(Arc<str>),
}

#[derive(Default)]
struct Subscribers {
    senders: HashMap<Uuid, mpsc::Sender<Frame>>,
    closed: bool,
}

/// Fan-out hub for event-stream clients.
#[derive(Default)]
pub struct Broker {
    inner: Mutex<Subscribers>,
}

impl Broker {
    /// Empty broker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber.
    ///
    /// After [`Broker::shutdown`] the returned subscription yields only the
    /// close frame.
    #[must_use]
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        {
            let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            if inner.closed {
                let _ = tx.try_send(close_frame());
            } else {
                inner.senders.insert(id, tx);
            }
        }
        info!(client_id = %id, "event-stream client subscribed");
        Subscription {
            id,
            rx,
            broker: Arc::clone(self),
        }
    }

    /// Push `payload` to every live subscriber. Returns the number reached.
    pub fn broadcast(&self, payload: &Value) -> usize {
        let frame = Frame::Data(Arc::from(payload.to_string()));
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner
            .senders
            .retain(|id, tx| match tx.try_send(frame.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    warn!(client_id = %id, "dropping stalled subscriber");
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(client_id = %id, "dropping disconnected subscriber");
                    false
                }
            });
        inner.senders.len()
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .senders
            .len()
    }

    /// Send the close frame to every subscriber and refuse new ones.
    pub fn shutdown(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.closed = true;
        let count = inner.senders.len();
        for (_, tx) in inner.senders.drain() {
            // A full queue just loses the close frame; dropping `tx` still
            // ends the stream.
            let _ = tx.try_send(close_frame());
        }
        info!(subscribers = count, "event-stream broker shut down");
    }

    fn unsubscribe(&self, id: Uuid) {
        let removed = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .senders
            .remove(&id)
            .is_some();
        if removed {
            info!(client_id = %id, "event-stream client disconnected");
        }
    }
}

fn close_frame() -> Frame {
    Frame::Close(Arc::from(
        json!({ "reason": "server_shutdown" }).to_string(),
    ))
}

/// A registered event-stream client. Unregisters on drop.
pub struct Subscription {
    id: Uuid,
    rx: mpsc::Receiver<Frame>,
    broker: Arc<Broker>,
}

impl Subscription {
    /// Client id announced in the connection frame.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Next frame, or `None` once the broker has let go of this client.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.broker.unsubscribe(self.id);
    }
}
