//! WebSocket upgrade handshake.

use crate::config::WsSettings;
use crate::http::context::Context;
use crate::http::response::StatusCode;
use crate::middleware::Handler;
use crate::ws::socket::{SocketHandler, WebSocket, run_socket};
use anyhow::Result;
use async_trait::async_trait;
use base64::Engine;
use sha1::{Digest, Sha1};
use std::sync::Arc;
use tracing::debug;

/// RFC 6455 GUID appended to the client key before hashing.
const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Compute the `Sec-WebSocket-Accept` value for a client key:
/// base64 of the SHA-1 of the key concatenated with the protocol GUID.
///
/// ```
/// # use outpost::ws::handshake::accept_key;
/// assert_eq!(
///     accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
///     "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
/// );
/// ```
pub fn accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}

/// Upgrade middleware: turns qualifying requests into WebSocket
/// connections and hands them to a [`SocketHandler`].
///
/// A request qualifies when `Sec-WebSocket-Version` is 13 and, if an
/// origin restriction is configured, its `Origin` header matches. All
/// other requests are passed down the chain untouched.
pub struct WsServer {
    settings: WsSettings,
    handler: Arc<dyn SocketHandler>,
}

impl WsServer {
    pub fn new(settings: WsSettings, handler: impl SocketHandler + 'static) -> Self {
        Self {
            settings,
            handler: Arc::new(handler),
        }
    }

    fn origin_allowed(&self, origin: &str) -> bool {
        match &self.settings.origin {
            Some(pattern) => {
                origin == format!("http://{pattern}") || origin == format!("https://{pattern}")
            }
            None => true,
        }
    }
}

#[async_trait]
impl Handler for WsServer {
    async fn handle(&self, ctx: &mut Context) -> Result<bool> {
        if let Some(origin) = ctx.request().header("Origin") {
            if !self.origin_allowed(origin) {
                return Ok(false);
            }
        }
        if ctx.request().header("Sec-WebSocket-Version") != Some("13") {
            return Ok(false);
        }

        ctx.response_mut().set_status(StatusCode::SwitchingProtocols);
        for name in ["Connection", "Sec-WebSocket-Protocol", "Upgrade"] {
            if let Some(value) = ctx.request().header(name) {
                let value = value.to_string();
                ctx.response_mut().set_header(name, value);
            }
        }
        if let Some(key) = ctx.request().header("Sec-WebSocket-Key") {
            let accept = accept_key(key);
            ctx.response_mut().set_header("Sec-WebSocket-Accept", accept);
        }

        // Flush the 101 header block. On failure the write path has
        // already resolved the context; report unhandled and let the
        // chain's fallback run its course.
        if ctx.write(&[]).await.is_err() {
            return Ok(false);
        }

        let conn = ctx.detach()?;
        let peer = conn.peer();
        let read_timeout = conn.settings().read_timeout();
        debug!(peer = %peer, "connection upgraded to websocket");

        let (reader, writer) = tokio::io::split(conn.into_stream());
        let socket = Arc::new(WebSocket::new(writer, peer));
        let handler = Arc::clone(&self.handler);
        let settings = self.settings.clone();
        tokio::spawn(run_socket(reader, socket, handler, settings, read_timeout));
        Ok(true)
    }
}
