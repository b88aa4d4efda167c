//! WebSocket connection handle and frame read loop.

use crate::config::WsSettings;
use crate::http::connection::Transport;
use crate::ws::frame::{self, Opcode};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::debug;

type Stream = BufReader<Box<dyn Transport>>;
pub(crate) type SocketReader = ReadHalf<Stream>;
type SocketWriter = WriteHalf<Stream>;

/// A complete message reassembled from one or more frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Text(String),
    Binary(Vec<u8>),
}

/// Callbacks for a WebSocket endpoint, supplied when the endpoint is
/// mounted. Each notification is awaited before the read loop continues,
/// so messages on one socket arrive strictly in order.
#[async_trait]
pub trait SocketHandler: Send + Sync {
    /// A connection finished its upgrade. Fired before the first frame is
    /// read.
    async fn on_open(&self, socket: &Arc<WebSocket>) {
        let _ = socket;
    }

    /// A complete text or binary message arrived.
    async fn on_message(&self, socket: &Arc<WebSocket>, message: Message);

    /// The read loop ended. Fired before the close frame goes out.
    async fn on_close(&self, socket: &Arc<WebSocket>) {
        let _ = socket;
    }
}

/// An upgraded connection.
///
/// The read loop owns the receiving half exclusively; sends share the
/// writing half behind a lock, so the handle can be cloned into other
/// tasks freely. Server frames go out unmasked with FIN set, one message
/// per frame.
pub struct WebSocket {
    writer: Mutex<Option<SocketWriter>>,
    peer: SocketAddr,
}

impl WebSocket {
    pub(crate) fn new(writer: SocketWriter, peer: SocketAddr) -> Self {
        Self {
            writer: Mutex::new(Some(writer)),
            peer,
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub async fn send_text(&self, text: &str) -> Result<()> {
        self.send_frame(Opcode::Text, text.as_bytes()).await
    }

    pub async fn send_binary(&self, data: &[u8]) -> Result<()> {
        self.send_frame(Opcode::Binary, data).await
    }

    /// Send a close frame and shut the stream down. Later sends fail.
    pub async fn close(&self) {
        let mut guard = self.writer.lock().await;
        if let Some(mut writer) = guard.take() {
            let _ = writer.write_all(&frame::encode_header(Opcode::Close, 0)).await;
            let _ = writer.flush().await;
            let _ = writer.shutdown().await;
        }
    }

    async fn send_frame(&self, opcode: Opcode, payload: &[u8]) -> Result<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or_else(|| anyhow!("socket is closed"))?;
        writer.write_all(&frame::encode_header(opcode, payload.len())).await?;
        if !payload.is_empty() {
            writer.write_all(payload).await?;
        }
        writer.flush().await?;
        Ok(())
    }
}

impl std::fmt::Debug for WebSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocket").field("peer", &self.peer).finish()
    }
}

/// Drive an upgraded connection: notify `on_open`, read frames until the
/// peer closes or fails, then notify `on_close` and send the close frame.
pub(crate) async fn run_socket(
    reader: SocketReader,
    socket: Arc<WebSocket>,
    handler: Arc<dyn SocketHandler>,
    settings: WsSettings,
    read_timeout: Duration,
) {
    handler.on_open(&socket).await;
    read_frames(reader, &socket, handler.as_ref(), &settings, read_timeout).await;
    handler.on_close(&socket).await;
    socket.close().await;
}

/// The frame read loop.
///
/// Fragments accumulate into one buffer at a running offset; the frame
/// that carries FIN completes the message, which is dispatched with its
/// cumulative length. Growing past the configured maximum message size
/// ends the loop, as does a close frame, a read failure, or a malformed
/// header. Waiting for the next frame is untimed (an idle socket is
/// fine); once a frame has started, the remaining bytes must arrive
/// within the read timeout.
async fn read_frames(
    mut reader: SocketReader,
    socket: &Arc<WebSocket>,
    handler: &dyn SocketHandler,
    settings: &WsSettings,
    read_timeout: Duration,
) {
    let max = settings.max_message_size;
    let mut buffer = BytesMut::new();
    let mut offset = 0usize;
    let mut kind = Opcode::Continuation;

    loop {
        let header = match frame::read_header(&mut reader).await {
            Ok(header) => header,
            Err(error) => {
                debug!(peer = %socket.peer(), error = %error, "frame read ended");
                break;
            }
        };
        if header.opcode == Opcode::Close {
            break;
        }
        if header.opcode != Opcode::Continuation {
            kind = header.opcode;
        }

        if header.payload_len > (max - offset) as u64 {
            debug!(
                peer = %socket.peer(),
                length = header.payload_len,
                max_message_size = max,
                "message exceeds maximum size"
            );
            break;
        }
        let len = header.payload_len as usize;

        buffer.resize(offset + len, 0);
        if len > 0 {
            let read = timeout(
                read_timeout,
                reader.read_exact(&mut buffer[offset..offset + len]),
            )
            .await;
            match read {
                Ok(Ok(_)) => {}
                _ => {
                    debug!(peer = %socket.peer(), "frame payload read failed");
                    break;
                }
            }
            if let Some(key) = header.mask {
                frame::apply_mask(&mut buffer[offset..offset + len], key);
            }
        }

        if header.fin {
            let total = offset + len;
            offset = 0;
            match kind {
                Opcode::Text => {
                    let text = String::from_utf8_lossy(&buffer[..total]).into_owned();
                    handler.on_message(socket, Message::Text(text)).await;
                }
                Opcode::Binary => {
                    handler
                        .on_message(socket, Message::Binary(buffer[..total].to_vec()))
                        .await;
                }
                // control frames and stray continuations carry no message
                _ => {}
            }
        } else {
            offset += len;
        }
    }
}
