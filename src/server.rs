//! Registry server
//!
//! Exposes a `Registry` over WebSocket: each text frame carries one JSON
//! `RegistryRequest` and is answered by exactly one `RegistryResponse`.
//! The registry is not involved in per-message room traffic.

use std::future::Future;
use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::error::ServerError;
use crate::message::{RegistryRequest, RegistryResponse};
use crate::registry::Registry;

/// Registry RPC server
#[derive(Debug, Clone)]
pub struct RegistryServer {
    registry: Registry,
}

impl RegistryServer {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    /// Accept connections forever
    pub async fn run(&self, listener: TcpListener) {
        if let Ok(addr) = listener.local_addr() {
            info!("Registry server listening on {}", addr);
        }
        self.accept_loop(&listener).await;
    }

    /// Accept connections until `shutdown` resolves
    pub async fn run_until<F>(&self, listener: TcpListener, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        if let Ok(addr) = listener.local_addr() {
            info!("Registry server listening on {}", addr);
        }

        tokio::select! {
            _ = shutdown => {
                info!("Shutdown signal received");
            }
            _ = self.accept_loop(&listener) => {}
        }
    }

    async fn accept_loop(&self, listener: &TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    debug!("New registry connection from {}", peer_addr);
                    let registry = self.registry.clone();

                    // Spawn handler task for each connection
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer_addr, registry).await {
                            error!("Registry connection {} error: {}", peer_addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}

/// Serve one registry client until it closes the connection
pub async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    registry: Registry,
) -> Result<(), ServerError> {
    // WebSocket handshake
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    while let Some(msg_result) = ws_receiver.next().await {
        match msg_result? {
            Message::Text(text) => {
                let response = match serde_json::from_str::<RegistryRequest>(&text) {
                    Ok(request) => dispatch(&registry, request).await,
                    Err(e) => {
                        warn!("Invalid request from {}: {}", peer_addr, e);
                        RegistryResponse::invalid_message(&e)
                    }
                };
                let json = serde_json::to_string(&response)?;
                ws_sender.send(Message::Text(json.into())).await?;
            }
            Message::Close(_) => {
                debug!("Registry client {} sent close frame", peer_addr);
                break;
            }
            _ => {
                // Ping/Pong are handled by tungstenite; binary frames are ignored
            }
        }
    }

    debug!("Registry connection {} closed", peer_addr);
    Ok(())
}

/// Run one request against the registry
async fn dispatch(registry: &Registry, request: RegistryRequest) -> RegistryResponse {
    let result = match request {
        RegistryRequest::CreateRoom { name, size } => registry.create_room(&name, size).await,
        RegistryRequest::FindRoom { name } => registry.find_room(&name).await,
    };

    match result {
        Ok(endpoint) => RegistryResponse::endpoint(endpoint),
        Err(e) => {
            debug!("Registry request failed: {}", e);
            e.into()
        }
    }
}
