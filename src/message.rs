//! Message definitions
//!
//! Two families live here:
//! - `Message`: one chat line inside a room, rendered as plain text
//! - `RegistryRequest` / `RegistryResponse`: the JSON protocol spoken by
//!   the registry server, using Serde's tagged enums

use std::fmt;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// A single chat line
///
/// `sender` is empty for system notices (join/leave).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub sender: String,
    pub text: String,
}

impl Message {
    /// A chat message from a named client
    pub fn chat(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
        }
    }

    /// A system notice with no sender
    pub fn notice(text: impl Into<String>) -> Self {
        Self {
            sender: String::new(),
            text: text.into(),
        }
    }

    pub fn joined(name: &str) -> Self {
        Self::notice(format!("{name} joined"))
    }

    pub fn left(name: &str) -> Self {
        Self::notice(format!("{name} left"))
    }

    pub fn is_notice(&self) -> bool {
        self.sender.is_empty()
    }
}

/// Wire rendering: `"<sender>: <text>"`, or the bare text for notices
impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_notice() {
            write!(f, "{}", self.text)
        } else {
            write!(f, "{}: {}", self.sender, self.text)
        }
    }
}

/// Caller → Registry request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegistryRequest {
    /// Allocate a new room; `size` is clamped by the registry
    CreateRoom { name: String, size: i32 },
    /// Resolve an existing room's endpoint
    FindRoom { name: String },
}

/// Registry → Caller response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegistryResponse {
    /// Endpoint of the created or found room
    RoomEndpoint {
        endpoint: String,
        port: u16,
        /// Always true from `RegistryServer`; unknown rooms get `Error`
        exists: bool,
    },
    /// Error occurred
    Error { code: ErrorCode, message: String },
}

impl RegistryResponse {
    pub fn endpoint(addr: SocketAddr) -> Self {
        RegistryResponse::RoomEndpoint {
            endpoint: addr.to_string(),
            port: addr.port(),
            exists: true,
        }
    }

    pub fn invalid_message(err: &serde_json::Error) -> Self {
        RegistryResponse::Error {
            code: ErrorCode::InvalidMessage,
            message: format!("Invalid message format: {}", err),
        }
    }
}

/// Error codes for RegistryResponse::Error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Room name is already registered
    AlreadyExists,
    /// Room name is not registered
    NotFound,
    /// Room could not be created (e.g. no port available)
    Unavailable,
    /// Request did not parse
    InvalidMessage,
}

/// Convert RegistryError to a wire error response
impl From<RegistryError> for RegistryResponse {
    fn from(err: RegistryError) -> Self {
        let code = match &err {
            RegistryError::AlreadyExists(_) => ErrorCode::AlreadyExists,
            RegistryError::NotFound(_) => ErrorCode::NotFound,
            RegistryError::Room(_) => ErrorCode::Unavailable,
        };
        RegistryResponse::Error {
            code,
            message: err.to_string(),
        }
    }
}
