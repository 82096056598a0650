//! Room registry (the butler)
//!
//! Process-wide directory of open rooms: name -> endpoint. Creating a room
//! binds it, publishes the mapping, and spawns the room; the mapping is
//! retired when the room's `open` returns.
//!
//! Thread-safe via `RwLock`. Lookups share the read lock; inserts and
//! removals take the write lock only for the map operation itself, never
//! across socket I/O.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::RegistryConfig;
use crate::error::RegistryError;
use crate::room::Room;

/// Directory of open rooms
///
/// Cheap to clone; clones share the same map.
#[derive(Debug, Clone)]
pub struct Registry {
    /// Map of room name to room endpoint
    rooms: Arc<RwLock<HashMap<String, SocketAddr>>>,

    /// Configuration
    config: RegistryConfig,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Create and start a room named `name`
    ///
    /// `requested_size` is clamped into `1..=max_room_size`. The mapping is
    /// visible to `find_room` before this returns; the room itself runs in
    /// the background and unregisters itself once it closes.
    pub async fn create_room(
        &self,
        name: &str,
        requested_size: i32,
    ) -> Result<SocketAddr, RegistryError> {
        if self.rooms.read().await.contains_key(name) {
            return Err(RegistryError::AlreadyExists(name.to_string()));
        }

        let room = Room::with_config(self.config.room_config(requested_size)).await?;
        let endpoint = room.endpoint();

        {
            let mut rooms = self.rooms.write().await;
            if rooms.contains_key(name) {
                // Lost a race with a concurrent create; `room` was never opened
                debug!("Discarding room at {} for duplicate name '{}'", endpoint, name);
                return Err(RegistryError::AlreadyExists(name.to_string()));
            }
            rooms.insert(name.to_string(), endpoint);
        }

        info!(
            "Creating room '{}' at {} (capacity {})",
            name,
            endpoint,
            room.capacity()
        );

        let registry = self.clone();
        let name = name.to_string();
        tokio::spawn(async move {
            room.open().await;
            registry.remove_room(&name, endpoint).await;
            info!("Room '{}' at {} closed successfully", name, endpoint);
        });

        Ok(endpoint)
    }

    /// Resolve the endpoint of a registered room
    pub async fn find_room(&self, name: &str) -> Result<SocketAddr, RegistryError> {
        self.rooms
            .read()
            .await
            .get(name)
            .copied()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Number of currently registered rooms
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Retire a mapping, only if it still points at the closed room
    async fn remove_room(&self, name: &str, endpoint: SocketAddr) {
        let mut rooms = self.rooms.write().await;
        if rooms.get(name) == Some(&endpoint) {
            rooms.remove(name);
        }
    }
}
