//! Ephemeral Chat Rooms Library
//!
//! In-memory chat rooms reachable over plain TCP, plus a registry that
//! allocates rooms by name and hands out their endpoints.
//!
//! # Features
//! - Rooms on ephemeral ports with a bounded number of participants
//! - Line protocol: first line is the display name, then chat lines
//! - Join/leave notices and broadcast to every other member
//! - Rooms close themselves when the last participant leaves
//! - Registry with unique room names, reachable over WebSocket/JSON
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `RoomActor` is the single owner of a room's membership
//! - Each connection has a `handler` task and a writer task talking to it
//! - No locks guard room state; the registry map sits behind an `RwLock`
//!
//! # Example
//! ```ignore
//! use room_chat::{Registry, RoomConnection};
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = Registry::new();
//!     let endpoint = registry.create_room("lobby", 2).await.unwrap();
//!
//!     let mut alice = RoomConnection::connect(endpoint, "alice").await.unwrap();
//!     alice.send("hello").await.unwrap();
//!     while let Ok(Some(line)) = alice.recv().await {
//!         println!("{line}");
//!     }
//! }
//! ```

pub mod actor;
pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod message;
pub mod registry;
pub mod remote;
pub mod room;
pub mod server;
pub mod types;

// Re-export main types for convenience
pub use actor::{RoomActor, RoomCommand, RoomHandle};
pub use client::Client;
pub use config::{
    clamp_room_size, ClientLimits, RegistryConfig, RoomConfig, DEFAULT_MAX_LINE_LENGTH,
    DEFAULT_MAX_ROOM_SIZE,
};
pub use error::{ClientError, ConnectionError, RegistryError, RoomError, SendError, ServerError};
pub use handler::{handle_connection, serve_client, LineReader};
pub use message::{ErrorCode, Message, RegistryRequest, RegistryResponse};
pub use registry::Registry;
pub use remote::{RegistryClient, RoomConnection};
pub use room::Room;
pub use server::RegistryServer;
pub use types::ClientId;
