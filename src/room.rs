//! Room listener
//!
//! A `Room` owns an ephemeral TCP endpoint. `open` runs the accept loop,
//! starts the room actor and hands each connection to a handler task,
//! gated by an admission semaphore sized to the room's capacity.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use crate::actor::RoomActor;
use crate::config::RoomConfig;
use crate::error::RoomError;
use crate::handler::handle_connection;

/// Pause after a failed accept before trying again
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(50);

/// A bound, not yet opened chat room
#[derive(Debug)]
pub struct Room {
    listener: TcpListener,
    endpoint: SocketAddr,
    config: RoomConfig,
}

impl Room {
    /// Bind a room with the given capacity and default settings
    pub async fn create(capacity: usize) -> Result<Self, RoomError> {
        Self::with_config(RoomConfig::new(capacity)).await
    }

    /// Bind a room on an ephemeral port of `config.bind_ip`
    pub async fn with_config(config: RoomConfig) -> Result<Self, RoomError> {
        if config.capacity == 0 {
            return Err(RoomError::InvalidCapacity);
        }

        let listener = TcpListener::bind((config.bind_ip, 0))
            .await
            .map_err(RoomError::Bind)?;
        let endpoint = listener.local_addr().map_err(RoomError::Bind)?;

        debug!("Room bound at {} (capacity {})", endpoint, config.capacity);

        Ok(Self {
            listener,
            endpoint,
            config,
        })
    }

    /// Address clients dial to reach this room
    pub fn endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Serve the room until it closes
    ///
    /// Returns once the last client has left (or the idle timeout fired).
    /// The listener is dropped on return, so later dials are refused.
    pub async fn open(self) {
        let Room {
            listener,
            endpoint,
            config,
        } = self;

        let (actor, handle, mut closed) =
            RoomActor::new(endpoint, config.command_buffer, config.idle_timeout);
        tokio::spawn(actor.run());

        let admission = Arc::new(Semaphore::new(config.capacity));
        let limits = config.client_limits();

        info!("Room {} open (capacity {})", endpoint, config.capacity);

        loop {
            tokio::select! {
                biased;

                _ = &mut closed => break,

                accepted = listener.accept() => match accepted {
                    Ok((stream, peer_addr)) => {
                        debug!("Room {}: new connection from {}", endpoint, peer_addr);

                        let handle = handle.clone();
                        let admission = Arc::clone(&admission);

                        tokio::spawn(async move {
                            if let Err(e) =
                                handle_connection(stream, peer_addr, handle, admission, limits).await
                            {
                                debug!("Connection {} ended with error: {}", peer_addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Room {}: failed to accept connection: {}", endpoint, e);
                        tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                    }
                },
            }
        }

        // Release connections still waiting for a slot
        admission.close();
        drop(listener);

        info!("Room {} closed", endpoint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::net::TcpStream;
    use tokio::time::timeout;

    use crate::remote::RoomConnection;

    const WAIT: Duration = Duration::from_secs(2);

    async fn next_line(conn: &mut RoomConnection) -> String {
        timeout(WAIT, conn.recv())
            .await
            .expect("timed out waiting for line")
            .expect("read failed")
            .expect("stream closed")
    }

    #[tokio::test]
    async fn test_zero_capacity_rejected() {
        let err = Room::create(0).await.unwrap_err();
        assert!(matches!(err, RoomError::InvalidCapacity));
    }

    #[tokio::test]
    async fn test_lobby_end_to_end() {
        let room = Room::create(2).await.unwrap();
        let endpoint = room.endpoint();
        let _open = tokio::spawn(room.open());

        let mut u1 = RoomConnection::connect(endpoint, "u1").await.unwrap();
        assert_eq!(next_line(&mut u1).await, "u1 joined");

        let mut u2 = RoomConnection::connect(endpoint, "u2").await.unwrap();
        assert_eq!(next_line(&mut u1).await, "u2 joined");
        assert_eq!(next_line(&mut u2).await, "u2 joined");

        u1.send("hi").await.unwrap();
        assert_eq!(next_line(&mut u2).await, "u1: hi");

        // Capacity reached: u3 is accepted but not admitted
        let mut u3 = RoomConnection::connect(endpoint, "u3").await.unwrap();
        assert!(timeout(Duration::from_millis(300), u1.recv()).await.is_err());

        drop(u2);

        // u1 never sees its own "hi"
        assert_eq!(next_line(&mut u1).await, "u2 left");
        assert_eq!(next_line(&mut u1).await, "u3 joined");
        assert_eq!(next_line(&mut u3).await, "u3 joined");
    }

    #[tokio::test]
    async fn test_room_closes_after_last_client_leaves() {
        let room = Room::create(3).await.unwrap();
        let endpoint = room.endpoint();
        let open = tokio::spawn(room.open());

        let mut a = RoomConnection::connect(endpoint, "a").await.unwrap();
        assert_eq!(next_line(&mut a).await, "a joined");
        let mut b = RoomConnection::connect(endpoint, "b").await.unwrap();
        assert_eq!(next_line(&mut b).await, "b joined");

        drop(a);
        assert_eq!(next_line(&mut b).await, "a left");
        drop(b);

        timeout(WAIT, open).await.unwrap().unwrap();
        assert!(TcpStream::connect(endpoint).await.is_err());
    }

    #[tokio::test]
    async fn test_disconnect_before_name_is_not_admitted() {
        let room = Room::create(2).await.unwrap();
        let endpoint = room.endpoint();
        let open = tokio::spawn(room.open());

        let silent = TcpStream::connect(endpoint).await.unwrap();
        drop(silent);

        let mut a = RoomConnection::connect(endpoint, "a").await.unwrap();
        assert_eq!(next_line(&mut a).await, "a joined");
        assert!(!open.is_finished());
    }

    #[tokio::test]
    async fn test_empty_name_accepted() {
        let room = Room::create(2).await.unwrap();
        let endpoint = room.endpoint();
        let _open = tokio::spawn(room.open());

        let mut anon = RoomConnection::connect(endpoint, "").await.unwrap();
        assert_eq!(next_line(&mut anon).await, " joined");
    }

    #[tokio::test]
    async fn test_idle_room_closes_when_configured() {
        let config = RoomConfig::new(2).with_idle_timeout(Duration::from_millis(50));
        let room = Room::with_config(config).await.unwrap();
        let endpoint = room.endpoint();

        timeout(WAIT, room.open()).await.unwrap();
        assert!(TcpStream::connect(endpoint).await.is_err());
    }

    #[tokio::test]
    async fn test_oversized_line_disconnects_sender() {
        let config = RoomConfig::new(3).with_max_line_length(16);
        let room = Room::with_config(config).await.unwrap();
        let endpoint = room.endpoint();
        let _open = tokio::spawn(room.open());

        let mut a = RoomConnection::connect(endpoint, "a").await.unwrap();
        assert_eq!(next_line(&mut a).await, "a joined");
        let mut b = RoomConnection::connect(endpoint, "b").await.unwrap();
        assert_eq!(next_line(&mut b).await, "b joined");
        let mut c = RoomConnection::connect(endpoint, "c").await.unwrap();
        assert_eq!(next_line(&mut b).await, "c joined");
        assert_eq!(next_line(&mut c).await, "c joined");

        a.send(&"x".repeat(17)).await.unwrap();

        // Nothing of the long line reaches the others
        assert_eq!(next_line(&mut b).await, "a left");
        assert_eq!(next_line(&mut c).await, "a left");

        b.send("still here").await.unwrap();
        assert_eq!(next_line(&mut c).await, "b: still here");
    }

    #[tokio::test]
    async fn test_default_limit_stops_unterminated_flood() {
        let room = Room::create(2).await.unwrap();
        let endpoint = room.endpoint();
        let _open = tokio::spawn(room.open());

        let mut a = RoomConnection::connect(endpoint, "a").await.unwrap();
        assert_eq!(next_line(&mut a).await, "a joined");
        let mut b = RoomConnection::connect(endpoint, "b").await.unwrap();
        assert_eq!(next_line(&mut b).await, "b joined");

        // 8 MiB with no newline; the server stops reading long before the end
        let flood = "y".repeat(8 * 1024 * 1024);
        tokio::spawn(async move {
            let _ = a.send(&flood).await;
        });

        assert_eq!(next_line(&mut b).await, "a left");
    }

    #[tokio::test]
    async fn test_oversized_name_is_not_admitted() {
        let config = RoomConfig::new(2).with_max_line_length(16);
        let room = Room::with_config(config).await.unwrap();
        let endpoint = room.endpoint();
        let _open = tokio::spawn(room.open());

        let mut long = RoomConnection::connect(endpoint, &"n".repeat(17)).await.unwrap();
        assert!(matches!(timeout(WAIT, long.recv()).await.unwrap(), Ok(None) | Err(_)));

        let mut a = RoomConnection::connect(endpoint, "a").await.unwrap();
        assert_eq!(next_line(&mut a).await, "a joined");
    }
}
