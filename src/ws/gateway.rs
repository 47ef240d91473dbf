//! Outbound routing to connected identities

use dashmap::DashMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};
use uuid::Uuid;

use super::protocol::ServerMsg;

/// Routes server messages to connection writer tasks.
///
/// Every send is a non-blocking enqueue. A connection whose queue is full
/// loses the message rather than stalling the caller.
pub struct Gateway {
    peers: DashMap<Uuid, mpsc::Sender<ServerMsg>>,
}

impl Gateway {
    pub fn new() -> Self {
        Self {
            peers: DashMap::new(),
        }
    }

    /// Attach the outbound queue for a new connection
    pub fn attach(&self, identity_id: Uuid, tx: mpsc::Sender<ServerMsg>) {
        self.peers.insert(identity_id, tx);
    }

    /// Detach a connection; no-op if already gone
    pub fn detach(&self, identity_id: &Uuid) {
        self.peers.remove(identity_id);
    }

    /// Send to a single identity
    pub fn send(&self, identity_id: &Uuid, msg: ServerMsg) {
        let Some(tx) = self.peers.get(identity_id).map(|tx| tx.value().clone()) else {
            debug!(identity_id = %identity_id, "Dropping message for detached identity");
            return;
        };

        match tx.try_send(msg) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(identity_id = %identity_id, "Outbound queue full, dropping message");
            }
            Err(TrySendError::Closed(_)) => {
                debug!(identity_id = %identity_id, "Outbound queue closed");
            }
        }
    }

    /// Send the same message to several identities
    pub fn send_many(&self, identity_ids: &[Uuid], msg: &ServerMsg) {
        for identity_id in identity_ids {
            self.send(identity_id, msg.clone());
        }
    }

    /// Send to every attached identity
    pub fn broadcast(&self, msg: &ServerMsg) {
        let ids: Vec<Uuid> = self.peers.iter().map(|entry| *entry.key()).collect();
        self.send_many(&ids, msg);
    }
}

impl Default for Gateway {
    fn default() -> Self {
        Self::new()
    }
}
