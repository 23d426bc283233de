//! Peer Handles
//!
//! A connected peer as seen by rooms: an id, a display name and the
//! sending half of the peer's bounded outbound mailbox.

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::network::protocol::ServerMessage;

/// Unique connection identifier.
pub type PeerId = Uuid;

/// Cloneable handle to a peer's outbound mailbox.
///
/// Rooms hold these without owning the connection; dropping a handle never
/// closes the socket.
#[derive(Debug, Clone)]
pub struct PeerHandle {
    id: PeerId,
    name: String,
    tx: mpsc::Sender<ServerMessage>,
}

impl PeerHandle {
    /// Create a handle with a fresh id.
    pub fn new(name: String, tx: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            tx,
        }
    }

    /// Same connection and mailbox under a new display name.
    pub fn with_name(&self, name: String) -> Self {
        Self {
            id: self.id,
            name,
            tx: self.tx.clone(),
        }
    }

    /// Connection id.
    pub fn id(&self) -> PeerId {
        self.id
    }

    /// Validated display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue a message without waiting.
    ///
    /// A full mailbox drops the message, so a stalled peer never blocks
    /// whoever is sending to it. Returns whether the message was queued.
    pub fn send(&self, message: ServerMessage) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                warn!(
                    peer = %self.id,
                    name = %self.name,
                    "mailbox full, dropping message: {:?}",
                    std::mem::discriminant(&dropped)
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(peer = %self.id, "mailbox closed, peer gone");
                false
            }
        }
    }
}

/// Rejected display name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    /// Empty after trimming.
    #[error("name is required")]
    Required,

    /// Longer than the configured limit.
    #[error("name too long")]
    TooLong,
}

/// Trim a display name and check its length in characters.
pub fn validate_name(raw: &str, max_len: usize) -> Result<String, NameError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(NameError::Required);
    }
    if name.chars().count() > max_len {
        return Err(NameError::TooLong);
    }
    Ok(name.to_string())
}
