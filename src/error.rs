//! Error types for rooms, the registry and its wire protocol
//!
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use crate::message::ErrorCode;

/// Room lifecycle errors
#[derive(Debug, Error)]
pub enum RoomError {
    /// No listening endpoint could be bound (port/resource exhaustion)
    #[error("failed to bind room listener: {0}")]
    Bind(#[source] std::io::Error),

    /// Capacity must be at least 1
    #[error("room capacity must be positive")]
    InvalidCapacity,

    /// The room's serializer has exited; no further commands are accepted
    #[error("room is closed")]
    Closed,
}

/// Errors that end a single client connection
///
/// Local to that client; never propagated to other members.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Read or write failure on the client stream
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The client sent a line longer than the room allows
    #[error("line exceeds {limit} bytes")]
    LineTooLong { limit: usize },

    /// The room closed underneath the connection
    #[error(transparent)]
    Room(#[from] RoomError),
}

/// Registry (butler) errors
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A room with this name is currently registered
    #[error("room \"{0}\" already exists")]
    AlreadyExists(String),

    /// No room with this name is registered
    #[error("room \"{0}\" does not exist")]
    NotFound(String),

    /// Creating the room itself failed
    #[error(transparent)]
    Room(#[from] RoomError),
}

/// Per-client delivery errors
///
/// Occurs when a message cannot be queued for a single client.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The client's outbound queue is full; the message was dropped
    #[error("Outbound queue full")]
    QueueFull,
}

/// Errors on one registry protocol connection (server side)
///
/// All of these are fatal to that connection only.
#[derive(Debug, Error)]
pub enum ServerError {
    /// WebSocket protocol error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Caller-side errors for the registry client and room connections
#[derive(Debug, Error)]
pub enum ClientError {
    /// WebSocket protocol error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The registry rejected a duplicate room name
    #[error("room already exists: {0}")]
    AlreadyExists(String),

    /// The registry has no room with this name
    #[error("room not found: {0}")]
    NotFound(String),

    /// Any other error reported by the registry
    #[error("registry error ({code:?}): {message}")]
    Remote { code: ErrorCode, message: String },

    /// The registry returned an endpoint that does not parse
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The registry closed the connection before answering
    #[error("connection closed")]
    ConnectionClosed,
}
