//! Room and registry configuration

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Upper bound on room capacity handed out by the registry
pub const DEFAULT_MAX_ROOM_SIZE: usize = 99;

/// Per-client outbound queue length
pub const DEFAULT_CLIENT_QUEUE_SIZE: usize = 256;

/// Room command channel length
pub const DEFAULT_COMMAND_BUFFER: usize = 256;

/// Longest accepted input line in bytes, newline excluded
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;

/// Configuration for a single room
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Maximum number of simultaneously admitted clients
    pub capacity: usize,

    /// Address the room's listener binds to (port is always ephemeral)
    pub bind_ip: IpAddr,

    /// Outbound messages buffered per client before new ones are dropped
    pub client_queue_size: usize,

    /// Buffer of the join/leave/broadcast command channel
    pub command_buffer: usize,

    /// A client sending a longer line is disconnected
    pub max_line_length: usize,

    /// Close a room that stays empty this long without anyone joining
    /// (None = stay open until the last client leaves)
    pub idle_timeout: Option<Duration>,
}

impl RoomConfig {
    /// Create a config with the given capacity and default settings
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            bind_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            client_queue_size: DEFAULT_CLIENT_QUEUE_SIZE,
            command_buffer: DEFAULT_COMMAND_BUFFER,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            idle_timeout: None,
        }
    }

    pub fn with_bind_ip(mut self, ip: IpAddr) -> Self {
        self.bind_ip = ip;
        self
    }

    pub fn with_client_queue_size(mut self, size: usize) -> Self {
        self.client_queue_size = size;
        self
    }

    pub fn with_max_line_length(mut self, max: usize) -> Self {
        self.max_line_length = max;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Per-connection limits handed to each connection handler
    pub fn client_limits(&self) -> ClientLimits {
        ClientLimits {
            queue_size: self.client_queue_size,
            max_line_length: self.max_line_length,
        }
    }
}

/// Limits applied to every client connection of a room
#[derive(Debug, Clone, Copy)]
pub struct ClientLimits {
    /// Outbound queue length
    pub queue_size: usize,
    /// Longest accepted input line
    pub max_line_length: usize,
}

/// Registry configuration, applied to every room it creates
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Requests outside `1..=max_room_size` are clamped to this value
    pub max_room_size: usize,

    /// Address rooms bind their listeners to
    pub bind_ip: IpAddr,

    /// Outbound queue length for clients of created rooms
    pub client_queue_size: usize,

    /// Longest accepted input line for clients of created rooms
    pub max_line_length: usize,

    /// Idle timeout for rooms nobody joins
    pub idle_timeout: Option<Duration>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_room_size: DEFAULT_MAX_ROOM_SIZE,
            bind_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            client_queue_size: DEFAULT_CLIENT_QUEUE_SIZE,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            idle_timeout: None,
        }
    }
}

impl RegistryConfig {
    /// Build the room config for a creation request of `requested` seats
    pub fn room_config(&self, requested: i32) -> RoomConfig {
        let mut config = RoomConfig::new(clamp_room_size(requested, self.max_room_size))
            .with_bind_ip(self.bind_ip)
            .with_client_queue_size(self.client_queue_size)
            .with_max_line_length(self.max_line_length);
        config.idle_timeout = self.idle_timeout;
        config
    }
}

/// Clamp a requested room size into `1..=max`
///
/// Non-positive and oversized requests both become `max`.
pub fn clamp_room_size(requested: i32, max: usize) -> usize {
    match usize::try_from(requested) {
        Ok(size) if size > 0 && size <= max => size,
        _ => max,
    }
}
