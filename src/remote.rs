//! Caller side of the registry and room protocols
//!
//! `RegistryClient` speaks the JSON-over-WebSocket registry protocol.
//! `RoomConnection` speaks the line protocol of a room: the first line is
//! the display name, every later line is a chat message.

use std::net::{IpAddr, SocketAddr};

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::error::ClientError;
use crate::message::{ErrorCode, RegistryRequest, RegistryResponse};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection to a registry server
pub struct RegistryClient {
    ws: WsStream,
    registry_addr: SocketAddr,
}

impl RegistryClient {
    pub async fn connect(registry_addr: SocketAddr) -> Result<Self, ClientError> {
        let (ws, _response) =
            tokio_tungstenite::connect_async(format!("ws://{}", registry_addr)).await?;
        debug!("Connected to registry at {}", registry_addr);
        Ok(Self { ws, registry_addr })
    }

    /// Ask the registry to create a room; returns a dialable endpoint
    pub async fn create_room(&mut self, name: &str, size: i32) -> Result<SocketAddr, ClientError> {
        let response = self
            .call(&RegistryRequest::CreateRoom {
                name: name.to_string(),
                size,
            })
            .await?;
        endpoint_from(name, self.registry_addr.ip(), response)
    }

    /// Look up an existing room; returns a dialable endpoint
    pub async fn find_room(&mut self, name: &str) -> Result<SocketAddr, ClientError> {
        let response = self
            .call(&RegistryRequest::FindRoom {
                name: name.to_string(),
            })
            .await?;
        endpoint_from(name, self.registry_addr.ip(), response)
    }

    pub async fn close(mut self) -> Result<(), ClientError> {
        self.ws.close(None).await?;
        Ok(())
    }

    async fn call(&mut self, request: &RegistryRequest) -> Result<RegistryResponse, ClientError> {
        let json = serde_json::to_string(request)?;
        self.ws.send(Message::Text(json.into())).await?;

        while let Some(msg) = self.ws.next().await {
            match msg? {
                Message::Text(text) => return Ok(serde_json::from_str(&text)?),
                Message::Close(_) => break,
                _ => {}
            }
        }

        Err(ClientError::ConnectionClosed)
    }
}

/// Turn a registry answer into a dialable endpoint
///
/// `RegistryServer` reports a missing room as a `not_found` error and never
/// sends `exists: false`. The flag is still part of the wire format, so an
/// answer carrying `exists: false` is read as not found as well.
fn endpoint_from(
    name: &str,
    registry_ip: IpAddr,
    response: RegistryResponse,
) -> Result<SocketAddr, ClientError> {
    match response {
        RegistryResponse::RoomEndpoint {
            endpoint,
            exists: true,
            ..
        } => {
            let addr: SocketAddr = endpoint
                .parse()
                .map_err(|_| ClientError::InvalidEndpoint(endpoint.clone()))?;
            Ok(resolve_endpoint(addr, registry_ip))
        }
        RegistryResponse::RoomEndpoint { exists: false, .. } => {
            Err(ClientError::NotFound(name.to_string()))
        }
        RegistryResponse::Error { code, message } => Err(match code {
            ErrorCode::AlreadyExists => ClientError::AlreadyExists(name.to_string()),
            ErrorCode::NotFound => ClientError::NotFound(name.to_string()),
            _ => ClientError::Remote { code, message },
        }),
    }
}

/// Rooms listening on all interfaces report `0.0.0.0`; dial the registry host instead
pub fn resolve_endpoint(endpoint: SocketAddr, registry_ip: IpAddr) -> SocketAddr {
    if endpoint.ip().is_unspecified() {
        SocketAddr::new(registry_ip, endpoint.port())
    } else {
        endpoint
    }
}

/// A participant's connection to a room
pub struct RoomConnection {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl RoomConnection {
    /// Dial a room and announce `name`
    pub async fn connect(endpoint: SocketAddr, name: &str) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(endpoint).await?;
        let (read_half, write_half) = stream.into_split();

        let mut conn = Self {
            lines: BufReader::new(read_half).lines(),
            writer: write_half,
        };
        conn.send(name).await?;
        Ok(conn)
    }

    /// Send one line
    pub async fn send(&mut self, text: &str) -> Result<(), ClientError> {
        let line = format!("{}\n", text);
        self.writer.write_all(line.as_bytes()).await?;
        Ok(())
    }

    /// Receive the next rendered line; `None` once the room closed the stream
    ///
    /// Cancel safe.
    pub async fn recv(&mut self) -> Result<Option<String>, ClientError> {
        Ok(self.lines.next_line().await?)
    }

    /// Stop sending; the room answers by removing this client
    pub async fn leave(mut self) -> Result<(), ClientError> {
        self.writer.shutdown().await?;
        Ok(())
    }
}
