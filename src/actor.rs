//! Room actor implementation
//!
//! The single serializer of a room: owns the membership map and decides the
//! order of every join, leave and broadcast. Connection handlers talk to it
//! only through `RoomHandle`, so no lock guards room state.
//!
//! Deliveries use `Client::deliver`, which never waits, so one slow or dead
//! client cannot stall the loop for everyone else.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::client::Client;
use crate::error::{RoomError, SendError};
use crate::message::Message;
use crate::types::ClientId;

/// Commands sent from connection handlers to the room actor
#[derive(Debug)]
pub enum RoomCommand {
    /// Admit a client and announce it to everyone, itself included
    Join { client: Client },
    /// Remove a client, close its queue and announce the departure
    Leave { client_id: ClientId },
    /// Deliver a chat line to every member not named like the sender
    Broadcast { message: Message },
}

/// Cloneable sending side of a room's command channel
#[derive(Debug, Clone)]
pub struct RoomHandle {
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub async fn join(&self, client: Client) -> Result<(), RoomError> {
        self.send(RoomCommand::Join { client }).await
    }

    pub async fn leave(&self, client_id: ClientId) -> Result<(), RoomError> {
        self.send(RoomCommand::Leave { client_id }).await
    }

    pub async fn broadcast(&self, sender: &str, text: String) -> Result<(), RoomError> {
        self.send(RoomCommand::Broadcast {
            message: Message::chat(sender, text),
        })
        .await
    }

    async fn send(&self, cmd: RoomCommand) -> Result<(), RoomError> {
        self.sender.send(cmd).await.map_err(|_| RoomError::Closed)
    }
}

/// The room actor
///
/// Processes commands until the last member leaves (or the idle timeout
/// fires), then fires the close signal exactly once and exits.
pub struct RoomActor {
    /// Current members: ClientId -> Client
    clients: HashMap<ClientId, Client>,
    /// Command receiver channel
    receiver: mpsc::Receiver<RoomCommand>,
    /// Fired when the room closes
    closed: oneshot::Sender<()>,
    /// Room endpoint, used in logs
    endpoint: SocketAddr,
    idle_timeout: Option<Duration>,
}

impl RoomActor {
    /// Create the actor, a handle to it, and the receiving end of its close signal
    pub fn new(
        endpoint: SocketAddr,
        command_buffer: usize,
        idle_timeout: Option<Duration>,
    ) -> (Self, RoomHandle, oneshot::Receiver<()>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(command_buffer);
        let (closed_tx, closed_rx) = oneshot::channel();

        let actor = Self {
            clients: HashMap::new(),
            receiver: cmd_rx,
            closed: closed_tx,
            endpoint,
            idle_timeout,
        };

        (actor, RoomHandle { sender: cmd_tx }, closed_rx)
    }

    /// Run the room event loop
    pub async fn run(mut self) {
        debug!("Room {} actor started", self.endpoint);

        while let Some(cmd) = self.next_command().await {
            if self.handle_command(cmd) {
                info!("Room {} is empty, closing it", self.endpoint);
                break;
            }
        }

        // Reject commands racing the close before signalling it
        self.receiver.close();
        let _ = self.closed.send(());

        debug!("Room {} actor stopped", self.endpoint);
    }

    /// Wait for the next command, honouring the idle timeout while empty
    async fn next_command(&mut self) -> Option<RoomCommand> {
        match self.idle_timeout {
            Some(limit) if self.clients.is_empty() => {
                match tokio::time::timeout(limit, self.receiver.recv()).await {
                    Ok(cmd) => cmd,
                    Err(_) => {
                        info!("Room {} idle for {:?}, closing it", self.endpoint, limit);
                        None
                    }
                }
            }
            _ => self.receiver.recv().await,
        }
    }

    /// Process a single command
    ///
    /// Returns true when the room must close.
    fn handle_command(&mut self, cmd: RoomCommand) -> bool {
        match cmd {
            RoomCommand::Join { client } => {
                self.handle_join(client);
                false
            }
            RoomCommand::Leave { client_id } => self.handle_leave(client_id),
            RoomCommand::Broadcast { message } => {
                self.handle_broadcast(message);
                false
            }
        }
    }

    fn handle_join(&mut self, client: Client) {
        info!(
            "Client {} ({}) joined room {} as '{}'",
            client.id, client.addr, self.endpoint, client.name
        );

        let notice = Message::joined(&client.name);
        self.clients.insert(client.id, client);

        for member in self.clients.values() {
            deliver(member, notice.clone());
        }

        debug!("Room {} members: {}", self.endpoint, self.clients.len());
    }

    fn handle_leave(&mut self, client_id: ClientId) -> bool {
        let Some(client) = self.clients.remove(&client_id) else {
            return false;
        };

        info!(
            "Client {} ('{}') left room {}",
            client.id, client.name, self.endpoint
        );

        let notice = Message::left(&client.name);
        // Closes the leaver's queue
        drop(client);

        for member in self.clients.values() {
            deliver(member, notice.clone());
        }

        self.clients.is_empty()
    }

    /// Exclusion is by display name, so every member sharing the sender's
    /// name is skipped, not only the sender itself.
    fn handle_broadcast(&mut self, message: Message) {
        for member in self.clients.values() {
            if member.name != message.sender {
                deliver(member, message.clone());
            }
        }
    }
}

fn deliver(member: &Client, msg: Message) {
    match member.deliver(msg) {
        Ok(()) => {}
        Err(SendError::QueueFull) => {
            warn!(
                "Outbound queue of client {} ('{}') is full, dropping message",
                member.id, member.name
            );
        }
        Err(SendError::ChannelClosed) => {
            debug!("Client {} writer is gone, skipping delivery", member.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::task::JoinHandle;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(2);

    fn endpoint() -> SocketAddr {
        "127.0.0.1:7000".parse().unwrap()
    }

    fn member(name: &str, queue: usize) -> (Client, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(queue);
        let client = Client::new(ClientId::new(), name.to_string(), endpoint(), tx);
        (client, rx)
    }

    fn start(idle: Option<Duration>) -> (RoomHandle, oneshot::Receiver<()>, JoinHandle<()>) {
        let (actor, handle, closed) = RoomActor::new(endpoint(), 16, idle);
        let task = tokio::spawn(actor.run());
        (handle, closed, task)
    }

    async fn next_line(rx: &mut mpsc::Receiver<Message>) -> String {
        timeout(WAIT, rx.recv())
            .await
            .expect("timed out waiting for message")
            .expect("queue closed")
            .to_string()
    }

    #[tokio::test]
    async fn test_join_announced_to_everyone_including_joiner() {
        let (room, _closed, _task) = start(None);
        let (a, mut a_rx) = member("A", 8);
        let (b, mut b_rx) = member("B", 8);

        room.join(a).await.unwrap();
        room.join(b).await.unwrap();

        assert_eq!(next_line(&mut a_rx).await, "A joined");
        assert_eq!(next_line(&mut a_rx).await, "B joined");
        assert_eq!(next_line(&mut b_rx).await, "B joined");
    }

    #[tokio::test]
    async fn test_join_then_leave_order() {
        let (room, _closed, _task) = start(None);
        let (a, mut a_rx) = member("A", 8);
        let (b, mut b_rx) = member("B", 8);
        let a_id = a.id;

        room.join(a).await.unwrap();
        room.join(b).await.unwrap();
        room.leave(a_id).await.unwrap();

        assert_eq!(next_line(&mut b_rx).await, "B joined");
        assert_eq!(next_line(&mut b_rx).await, "A left");

        // A sees both joins, then its queue is closed
        assert_eq!(next_line(&mut a_rx).await, "A joined");
        assert_eq!(next_line(&mut a_rx).await, "B joined");
        assert!(timeout(WAIT, a_rx.recv()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_broadcast_excludes_by_name() {
        let (room, _closed, _task) = start(None);
        let (alice1, mut alice1_rx) = member("alice", 8);
        let (alice2, mut alice2_rx) = member("alice", 8);
        let (bob, mut bob_rx) = member("bob", 8);

        room.join(alice1).await.unwrap();
        room.join(alice2).await.unwrap();
        room.join(bob).await.unwrap();
        room.broadcast("alice", "hello".to_string()).await.unwrap();
        room.broadcast("bob", "sync".to_string()).await.unwrap();

        assert_eq!(next_line(&mut bob_rx).await, "bob joined");
        assert_eq!(next_line(&mut bob_rx).await, "alice: hello");

        // Neither alice receives "alice: hello"; the next line after the
        // joins is bob's message
        for rx in [&mut alice1_rx, &mut alice2_rx] {
            loop {
                let line = next_line(rx).await;
                if !line.ends_with("joined") {
                    assert_eq!(line, "bob: sync");
                    break;
                }
            }
        }
    }

    #[tokio::test]
    async fn test_last_leave_closes_room() {
        let (room, closed, task) = start(None);
        let (a, _a_rx) = member("A", 8);
        let a_id = a.id;

        room.join(a).await.unwrap();
        room.leave(a_id).await.unwrap();

        timeout(WAIT, closed).await.unwrap().unwrap();
        timeout(WAIT, task).await.unwrap().unwrap();

        let (late, _late_rx) = member("late", 8);
        assert!(matches!(room.join(late).await, Err(RoomError::Closed)));
    }

    #[tokio::test]
    async fn test_room_stays_open_until_last_member_leaves() {
        let (room, mut closed, _task) = start(None);
        let (a, _a_rx) = member("A", 8);
        let (b, mut b_rx) = member("B", 8);
        let a_id = a.id;

        room.join(a).await.unwrap();
        room.join(b).await.unwrap();
        room.leave(a_id).await.unwrap();

        assert_eq!(next_line(&mut b_rx).await, "B joined");
        assert_eq!(next_line(&mut b_rx).await, "A left");
        assert!(closed.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unknown_leave_is_ignored() {
        let (room, _closed, _task) = start(None);
        let (a, mut a_rx) = member("A", 8);

        room.join(a).await.unwrap();
        room.leave(ClientId::new()).await.unwrap();
        room.broadcast("B", "still here".to_string()).await.unwrap();

        assert_eq!(next_line(&mut a_rx).await, "A joined");
        assert_eq!(next_line(&mut a_rx).await, "B: still here");
    }

    #[tokio::test]
    async fn test_slow_client_does_not_stall_others() {
        let (room, _closed, _task) = start(None);
        // Never drained, room for one message only
        let (slow, _slow_rx) = member("slow", 1);
        let (fast, mut fast_rx) = member("fast", 8);

        room.join(slow).await.unwrap();
        room.join(fast).await.unwrap();
        for i in 0..5 {
            room.broadcast("other", format!("m{i}")).await.unwrap();
        }

        assert_eq!(next_line(&mut fast_rx).await, "fast joined");
        for i in 0..5 {
            assert_eq!(next_line(&mut fast_rx).await, format!("other: m{i}"));
        }
    }

    #[tokio::test]
    async fn test_idle_timeout_closes_unjoined_room() {
        let (_room, closed, task) = start(Some(Duration::from_millis(50)));

        timeout(WAIT, closed).await.unwrap().unwrap();
        timeout(WAIT, task).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_no_idle_timeout_keeps_unjoined_room_open() {
        let (_room, closed, _task) = start(None);

        assert!(timeout(Duration::from_millis(100), closed).await.is_err());
    }
}
