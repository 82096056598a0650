//! Client struct definition
//!
//! Represents an admitted client as seen by the room's serializer.

use std::net::SocketAddr;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::SendError;
use crate::message::Message;
use crate::types::ClientId;

/// Connected client information
///
/// Holds the identity, display name and outbound queue of a client.
/// Dropping the `Client` closes its queue, which ends its message writer.
#[derive(Debug)]
pub struct Client {
    /// Unique identifier for this client
    pub id: ClientId,
    /// Display name (first line sent by the client, may repeat across clients)
    pub name: String,
    /// Remote address, diagnostics only
    pub addr: SocketAddr,
    /// Room → Client message channel
    sender: mpsc::Sender<Message>,
}

impl Client {
    /// Create a new client with the given identity and sender channel
    pub fn new(
        id: ClientId,
        name: String,
        addr: SocketAddr,
        sender: mpsc::Sender<Message>,
    ) -> Self {
        Self {
            id,
            name,
            addr,
            sender,
        }
    }

    /// Queue a message for this client without waiting
    ///
    /// Never blocks: a full queue drops the message and reports `QueueFull`.
    pub fn deliver(&self, msg: Message) -> Result<(), SendError> {
        self.sender.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => SendError::QueueFull,
            TrySendError::Closed(_) => SendError::ChannelClosed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:9000".parse().unwrap()
    }

    #[tokio::test]
    async fn test_client_deliver() {
        let (tx, mut rx) = mpsc::channel(4);
        let client = Client::new(ClientId::new(), "alice".to_string(), addr(), tx);

        client.deliver(Message::chat("bob", "hi")).unwrap();

        assert_eq!(rx.recv().await.unwrap().to_string(), "bob: hi");
    }

    #[tokio::test]
    async fn test_client_deliver_queue_full() {
        let (tx, _rx) = mpsc::channel(1);
        let client = Client::new(ClientId::new(), "alice".to_string(), addr(), tx);

        client.deliver(Message::notice("one")).unwrap();
        let err = client.deliver(Message::notice("two")).unwrap_err();

        assert!(matches!(err, SendError::QueueFull));
    }

    #[tokio::test]
    async fn test_client_deliver_closed() {
        let (tx, rx) = mpsc::channel(1);
        let client = Client::new(ClientId::new(), "alice".to_string(), addr(), tx);
        drop(rx);

        let err = client.deliver(Message::notice("gone")).unwrap_err();

        assert!(matches!(err, SendError::ChannelClosed));
    }
}
