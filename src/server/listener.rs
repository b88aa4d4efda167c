//! Connection accept loop and the per-connection request cycle.

use crate::config::ServerSettings;
use crate::http::connection::Connection;
use crate::http::context::{Context, Disposition};
use crate::http::parser::{self, ParseError};
use crate::http::response::StatusCode;
use crate::middleware::Chain;
use crate::server::tls;
use anyhow::Result;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpSocket};
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info, trace, warn};

/// A socket-based HTTP provider: binds the listening socket, accepts
/// connections and runs one worker task per connection. Settings are
/// cloned at construction and read-only from then on.
pub struct HttpServer {
    settings: ServerSettings,
    chain: Arc<Chain>,
}

impl HttpServer {
    pub fn new(settings: ServerSettings, chain: Chain) -> Self {
        Self {
            settings,
            chain: Arc::new(chain),
        }
    }

    /// Bind the listening socket with the configured backlog.
    pub fn bind(&self) -> Result<TcpListener> {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.settings.port));
        let socket = TcpSocket::new_v4()?;
        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;
        Ok(socket.listen(self.settings.backlog)?)
    }

    /// Bind and serve until the future is dropped. Dropping it closes the
    /// listening socket; connections already being served run on.
    pub async fn run(&self) -> Result<()> {
        let listener = self.bind()?;
        self.serve_on(listener).await
    }

    /// Serve connections from an already-bound listener.
    pub async fn serve_on(&self, listener: TcpListener) -> Result<()> {
        let acceptor = match &self.settings.tls {
            Some(tls_settings) => Some(tls::load_acceptor(tls_settings)?),
            None => None,
        };
        info!(
            port = listener.local_addr().map(|a| a.port()).unwrap_or(0),
            tls = acceptor.is_some(),
            "listening"
        );

        loop {
            let (stream, peer) = listener.accept().await?;
            trace!(peer = %peer, "accepted connection");
            if let Err(error) = stream.set_nodelay(true) {
                debug!(peer = %peer, error = %error, "failed to disable nagle buffering");
            }

            let settings = self.settings.clone();
            let chain = Arc::clone(&self.chain);
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                let conn = match accept_stream(stream, peer, acceptor, settings).await {
                    Some(conn) => conn,
                    None => return,
                };
                serve(conn, chain).await;
            });
        }
    }
}

/// Perform the optional TLS handshake before any protocol bytes are read.
/// A failed handshake disposes of the connection.
async fn accept_stream(
    stream: tokio::net::TcpStream,
    peer: SocketAddr,
    acceptor: Option<TlsAcceptor>,
    settings: ServerSettings,
) -> Option<Connection> {
    match acceptor {
        Some(acceptor) => match acceptor.accept(stream).await {
            Ok(tls_stream) => Some(Connection::new(tls_stream, peer, true, settings)),
            Err(error) => {
                debug!(peer = %peer, error = %error, "tls handshake failed");
                None
            }
        },
        None => Some(Connection::new(stream, peer, false, settings)),
    }
}

/// The request cycle for one connection. Requests on a kept-alive
/// connection are handled strictly one after another; the loop replaces
/// the recursive reuse a release-driven design would cause.
pub(crate) async fn serve(mut conn: Connection, chain: Arc<Chain>) {
    loop {
        let head = match parser::read_request_head(&mut conn).await {
            Ok(head) => head,
            Err(ParseError::Closed) => {
                trace!(peer = %conn.peer(), "connection closed by peer");
                return;
            }
            Err(error) => {
                // Malformed or undeliverable request: close without a
                // response.
                debug!(peer = %conn.peer(), error = %error, "dropping connection");
                return;
            }
        };

        trace!(
            peer = %conn.peer(),
            method = %head.method,
            target = %head.target,
            "request"
        );
        let mut ctx = Context::new(conn, head);
        dispatch(&mut ctx, &chain).await;

        match ctx.finish() {
            Disposition::KeepAlive(next) => conn = next,
            Disposition::Close | Disposition::Detached => return,
        }
    }
}

/// Run the chain over a context and make sure the request resolves no
/// matter what the handlers did.
async fn dispatch(ctx: &mut Context, chain: &Chain) {
    match chain.dispatch(ctx).await {
        Ok(true) => {
            // claimed; release covers handlers that wrote without sending
            ctx.release().await;
        }
        Ok(false) => {
            ctx.response_mut().set_status(StatusCode::NotFound);
            ctx.release().await;
        }
        Err(error) => {
            if ctx.header_sent() {
                // a response is already in flight and cannot be amended
                warn!(
                    peer = %ctx.request().peer(),
                    error = %format!("{error:#}"),
                    "handler failed after headers were sent"
                );
                ctx.abort();
                ctx.release().await;
            } else {
                warn!(
                    peer = %ctx.request().peer(),
                    error = %format!("{error:#}"),
                    "handler failed"
                );
                ctx.response_mut().set_status(StatusCode::InternalServerError);
                if ctx.request().is_local() {
                    // loopback callers get the error detail
                    let detail = format!("{error:#}");
                    let _ = ctx.send_text(&detail).await;
                } else {
                    ctx.release().await;
                }
            }
        }
    }
}
