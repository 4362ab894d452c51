//! Connection message handler
//!
//! Routes host requests on one connection to the tree provider.

use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::protocol::{ClientEnvelope, ClientMessage, ErrorCode, ServerMessage};
use crate::tree::TreeDataProvider;

/// Handles the requests of a single host connection
pub struct ConnectionHandler<P> {
    connection_id: Uuid,
    provider: Arc<P>,
}

impl<P: TreeDataProvider> ConnectionHandler<P> {
    /// Create a new connection handler
    pub fn new(provider: Arc<P>) -> Self {
        Self {
            connection_id: Uuid::new_v4(),
            provider,
        }
    }

    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    /// Handle a client message and return the direct response, if any.
    ///
    /// `refresh` has no direct response: its outcome reaches every
    /// connection through the provider's change events.
    pub async fn handle(&self, text: &str) -> Option<ServerMessage> {
        let envelope = match ClientEnvelope::from_json(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Connection {}: rejected message: {}", self.connection_id, e);
                return Some(e.into());
            }
        };

        match envelope.message {
            ClientMessage::Ping { seq } => {
                debug!("Connection {}: ping {}", self.connection_id, seq);
                Some(ServerMessage::pong(seq))
            }
            ClientMessage::GetChildren { parent } => {
                debug!(
                    "Connection {}: get_children parent={:?}",
                    self.connection_id, parent
                );
                match self.provider.produce_children(parent.as_deref()).await {
                    Ok(nodes) => Some(ServerMessage::children(parent, nodes)),
                    Err(e) => Some(ServerMessage::error_with_code(
                        e.to_string(),
                        ErrorCode::ExecutionFailed,
                    )),
                }
            }
            ClientMessage::Refresh => {
                debug!("Connection {}: refresh", self.connection_id);
                if let Err(e) = self.provider.refresh().await {
                    debug!("Connection {}: refresh failed: {}", self.connection_id, e);
                }
                None
            }
        }
    }
}
