//! Protocol message definitions
//!
//! Defines the message types exchanged between the IDE host and the bridge.
//! All messages are JSON-encoded and may carry version information for
//! compatibility.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tree::{DisplayNode, TreeEvent};

/// Current protocol version
/// Increment when making breaking changes to message format
pub const PROTOCOL_VERSION: u32 = 1;

/// Minimum supported protocol version
pub const MIN_PROTOCOL_VERSION: u32 = 1;

/// Maximum node id length accepted as a parent
pub const MAX_PATH_LENGTH: usize = 4096;

// ============================================================================
// Error Types
// ============================================================================

/// Protocol-related errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Protocol version {0} not supported (min: {MIN_PROTOCOL_VERSION}, current: {PROTOCOL_VERSION})")]
    UnsupportedVersion(u32),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Result type for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;

// ============================================================================
// Message Envelope
// ============================================================================

/// Protocol envelope wrapping all client messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientEnvelope {
    /// Protocol version used by the client
    #[serde(default = "default_version")]
    pub version: u32,
    /// The actual message payload
    #[serde(flatten)]
    pub message: ClientMessage,
}

fn default_version() -> u32 {
    PROTOCOL_VERSION
}

impl ClientEnvelope {
    /// Create a new client envelope with the current protocol version
    pub fn new(message: ClientMessage) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            message,
        }
    }

    /// Parse and validate a client envelope from JSON
    pub fn from_json(json: &str) -> ProtocolResult<Self> {
        let envelope: Self = serde_json::from_str(json)?;
        envelope.validate()?;
        Ok(envelope)
    }

    /// Validate the envelope and its contents
    pub fn validate(&self) -> ProtocolResult<()> {
        if self.version < MIN_PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedVersion(self.version));
        }

        self.message.validate()
    }

    /// Serialize the envelope to JSON
    pub fn to_json(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// Client Messages
// ============================================================================

/// Messages sent from the host to the bridge
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Connection keepalive ping
    Ping {
        /// Sequence number for tracking round-trip time
        seq: u64,
    },

    /// Request the children of a node, or the root entries
    GetChildren {
        /// Id of the parent node, absent for the root
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent: Option<String>,
    },

    /// Re-fetch the worktree list and redraw
    Refresh,
}

impl ClientMessage {
    /// Validate message contents
    pub fn validate(&self) -> ProtocolResult<()> {
        match self {
            ClientMessage::Ping { .. } => Ok(()),

            ClientMessage::GetChildren { parent } => {
                if let Some(p) = parent {
                    if p.is_empty() {
                        return Err(ProtocolError::ValidationError(
                            "parent cannot be empty when specified".to_string(),
                        ));
                    }
                    if p.len() > MAX_PATH_LENGTH {
                        return Err(ProtocolError::ValidationError(format!(
                            "parent exceeds maximum length of {} characters",
                            MAX_PATH_LENGTH
                        )));
                    }
                }
                Ok(())
            }

            ClientMessage::Refresh => Ok(()),
        }
    }

    /// Create a Ping message
    pub fn ping(seq: u64) -> Self {
        ClientMessage::Ping { seq }
    }

    /// Create a GetChildren message for the root
    pub fn get_root() -> Self {
        ClientMessage::GetChildren { parent: None }
    }

    /// Create a GetChildren message for a node
    pub fn get_children(parent: impl Into<String>) -> Self {
        ClientMessage::GetChildren {
            parent: Some(parent.into()),
        }
    }
}

// ============================================================================
// Server Messages
// ============================================================================

/// Messages sent from the bridge to the host
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Welcome message sent on connection
    Welcome {
        /// Server protocol version
        version: u32,
        /// Server identifier
        #[serde(skip_serializing_if = "Option::is_none")]
        server_id: Option<String>,
        /// Repository root being listed
        workspace: String,
    },

    /// Response to Ping
    Pong {
        /// Echo back the sequence number
        seq: u64,
    },

    /// Children of the requested node
    Children {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent: Option<String>,
        nodes: Vec<DisplayNode>,
    },

    /// The tree changed and should be requested again
    TreeChanged { node_count: usize },

    /// Error response
    Error {
        /// Error message
        message: String,
        /// Error code for programmatic handling
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<ErrorCode>,
    },
}

/// Error codes for programmatic error handling
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Invalid message format
    InvalidMessage,
    /// Unsupported protocol version
    UnsupportedVersion,
    /// `git worktree list` could not be run
    ExecutionFailed,
}

impl ServerMessage {
    /// Create a Welcome message
    pub fn welcome(server_id: impl Into<String>, workspace: impl Into<String>) -> Self {
        ServerMessage::Welcome {
            version: PROTOCOL_VERSION,
            server_id: Some(server_id.into()),
            workspace: workspace.into(),
        }
    }

    /// Create a Pong message
    pub fn pong(seq: u64) -> Self {
        ServerMessage::Pong { seq }
    }

    /// Create a Children message
    pub fn children(parent: Option<String>, nodes: Vec<DisplayNode>) -> Self {
        ServerMessage::Children { parent, nodes }
    }

    /// Create an Error message with code
    pub fn error_with_code(message: impl Into<String>, code: ErrorCode) -> Self {
        ServerMessage::Error {
            message: message.into(),
            code: Some(code),
        }
    }

    /// Serialize the message to JSON
    pub fn to_json(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// Conversion Traits
// ============================================================================

impl From<ProtocolError> for ServerMessage {
    fn from(err: ProtocolError) -> Self {
        let code = match &err {
            ProtocolError::SerializationError(_) => ErrorCode::InvalidMessage,
            ProtocolError::UnsupportedVersion(_) => ErrorCode::UnsupportedVersion,
            ProtocolError::ValidationError(_) => ErrorCode::InvalidMessage,
        };
        ServerMessage::error_with_code(err.to_string(), code)
    }
}

impl From<TreeEvent> for ServerMessage {
    fn from(event: TreeEvent) -> Self {
        match event {
            TreeEvent::Changed { node_count } => ServerMessage::TreeChanged { node_count },
            TreeEvent::FetchFailed { message } => {
                ServerMessage::error_with_code(message, ErrorCode::ExecutionFailed)
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
