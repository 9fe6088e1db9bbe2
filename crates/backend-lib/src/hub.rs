// ============================
// crates/backend-lib/src/hub.rs
// ============================
//! Outbound channels of every live WebSocket connection.
use dashmap::DashMap;
use huddle_common::{ConnectionId, ServerEvent};
use metrics::gauge;
use tokio::sync::mpsc;

use crate::metrics::WS_ACTIVE;

pub type EventSender = mpsc::UnboundedSender<ServerEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ServerEvent>;

/// Connection ID -> outbound event channel
#[derive(Default)]
pub struct ConnectionHub {
    senders: DashMap<ConnectionId, EventSender>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a channel for a new connection and return its receiving end
    pub fn register(&self, connection: ConnectionId) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.insert(connection, tx);
        gauge!(WS_ACTIVE).set(self.senders.len() as f64);
        rx
    }

    pub fn unregister(&self, connection: &str) {
        if self.senders.remove(connection).is_some() {
            gauge!(WS_ACTIVE).set(self.senders.len() as f64);
        }
    }

    pub fn is_connected(&self, connection: &str) -> bool {
        self.senders
            .get(connection)
            .is_some_and(|tx| !tx.is_closed())
    }

    /// Queue an event for one connection.
    ///
    /// Returns `false` when the connection is gone; delivery failures are
    /// never an error for the caller.
    pub fn send(&self, connection: &str, event: ServerEvent) -> bool {
        let Some(tx) = self.senders.get(connection).map(|entry| entry.value().clone()) else {
            return false;
        };
        tx.send(event).is_ok()
    }

    /// Queue the same event for several connections
    pub fn send_many<'a, I>(&self, connections: I, event: &ServerEvent)
    where
        I: IntoIterator<Item = &'a ConnectionId>,
    {
        for connection in connections {
            if !self.send(connection, event.clone()) {
                tracing::debug!(%connection, "dropping event for closed connection");
            }
        }
    }
}
