//! Room connection handler
//!
//! One handler per accepted TCP connection. It waits for an admission slot,
//! reads the display name, joins the room, forwards every further line as a
//! broadcast and finally leaves. A spawned message writer drains the
//! client's outbound queue back onto the socket.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tracing::{debug, info, warn};

use crate::actor::RoomHandle;
use crate::client::Client;
use crate::config::ClientLimits;
use crate::error::ConnectionError;
use crate::message::Message;
use crate::types::ClientId;

/// Newline-delimited reader that refuses lines over a fixed length
///
/// At most `max_len + 1` bytes are buffered per line. A trailing `\r` is
/// stripped like `\n`. Not cancel safe.
pub struct LineReader<R> {
    reader: BufReader<R>,
    max_len: usize,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(inner: R, max_len: usize) -> Self {
        Self {
            reader: BufReader::new(inner),
            max_len,
        }
    }

    /// Read the next line; `None` at end of stream
    pub async fn next_line(&mut self) -> Result<Option<String>, ConnectionError> {
        let limit = (self.max_len as u64).saturating_add(1);
        let mut buf = Vec::new();

        let n = (&mut self.reader)
            .take(limit)
            .read_until(b'\n', &mut buf)
            .await?;
        if n == 0 {
            return Ok(None);
        }

        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        } else if n > self.max_len {
            return Err(ConnectionError::LineTooLong {
                limit: self.max_len,
            });
        }

        let line = String::from_utf8(buf)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(Some(line))
    }
}

/// Handle a new room connection
///
/// The admission permit is held until this function returns, so the slot is
/// released on every exit path.
pub async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    room: RoomHandle,
    admission: Arc<Semaphore>,
    limits: ClientLimits,
) -> Result<(), ConnectionError> {
    let Ok(_permit) = admission.acquire_owned().await else {
        debug!("Room closed before {} was admitted", peer_addr);
        return Ok(());
    };

    debug!("New unnamed connection from {}", peer_addr);

    let (read_half, write_half) = stream.into_split();
    serve_client(read_half, write_half, peer_addr, room, limits).await
}

/// Run one admitted client: name line, join, forward lines, leave
pub async fn serve_client<R, W>(
    reader: R,
    writer: W,
    peer_addr: SocketAddr,
    room: RoomHandle,
    limits: ClientLimits,
) -> Result<(), ConnectionError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut lines = LineReader::new(reader, limits.max_line_length);

    let name = match lines.next_line().await {
        Ok(Some(name)) => name,
        Ok(None) => {
            debug!("{} disconnected before sending a name", peer_addr);
            return Ok(());
        }
        Err(e) => {
            warn!("Dropping {} before join: {}", peer_addr, e);
            return Err(e);
        }
    };

    let client_id = ClientId::new();
    info!("Connection from {} is '{}' ({})", peer_addr, name, client_id);

    // Channel for room -> client messages
    let (msg_tx, msg_rx) = mpsc::channel::<Message>(limits.queue_size);
    let (done_tx, done_rx) = oneshot::channel::<()>();

    let mut writer = tokio::spawn(message_writer(writer, msg_rx, done_rx, client_id));

    room.join(Client::new(client_id, name.clone(), peer_addr, msg_tx))
        .await?;

    // Wait for either the input stream to end or the writer to fail
    let result = tokio::select! {
        res = forward_lines(&mut lines, &room, &name) => res,
        _ = &mut writer => {
            debug!("Writer for {} stopped, ending connection", client_id);
            Ok(())
        }
    };

    if let Err(ConnectionError::LineTooLong { limit }) = &result {
        warn!("Client {} ('{}') sent a line over {} bytes", client_id, name, limit);
    }

    let _ = done_tx.send(());

    if let Err(e) = room.leave(client_id).await {
        debug!("Leave for {} not delivered: {}", client_id, e);
    }

    info!("Client {} ('{}') disconnected", client_id, name);

    result
}

/// Forward every input line to the room as a chat message
async fn forward_lines<R: AsyncRead + Unpin>(
    lines: &mut LineReader<R>,
    room: &RoomHandle,
    name: &str,
) -> Result<(), ConnectionError> {
    while let Some(line) = lines.next_line().await? {
        room.broadcast(name, line).await?;
    }
    Ok(())
}

/// Write queued messages to the client, one line each
///
/// Exits when the queue is closed (the room removed the client), when the
/// handler signals `done`, or on the first write failure.
pub async fn message_writer<W: AsyncWrite + Unpin>(
    mut writer: W,
    mut messages: mpsc::Receiver<Message>,
    mut done: oneshot::Receiver<()>,
    client_id: ClientId,
) {
    loop {
        tokio::select! {
            msg = messages.recv() => {
                let Some(msg) = msg else {
                    break;
                };
                let line = format!("{}\n", msg);
                if let Err(e) = writer.write_all(line.as_bytes()).await {
                    debug!("Write to {} failed: {}", client_id, e);
                    return;
                }
            }
            _ = &mut done => break,
        }
    }

    let _ = writer.shutdown().await;
    debug!("Writer task ended for {}", client_id);
}
