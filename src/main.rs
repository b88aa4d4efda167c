use async_trait::async_trait;
use outpost::config::{ServerSettings, WsSettings};
use outpost::http::context::Context;
use outpost::middleware::{Chain, HandlerFn, HandlerFuture};
use outpost::server::HttpServer;
use outpost::ws::{Message, SocketHandler, WebSocket, WsServer};
use std::sync::Arc;

/// Echoes every message back to its sender.
struct Echo;

#[async_trait]
impl SocketHandler for Echo {
    async fn on_open(&self, socket: &Arc<WebSocket>) {
        tracing::info!(peer = %socket.peer(), "websocket opened");
    }

    async fn on_message(&self, socket: &Arc<WebSocket>, message: Message) {
        let result = match &message {
            Message::Text(text) => socket.send_text(text).await,
            Message::Binary(data) => socket.send_binary(data).await,
        };
        if let Err(error) = result {
            tracing::warn!(peer = %socket.peer(), error = %error, "echo failed");
        }
    }

    async fn on_close(&self, socket: &Arc<WebSocket>) {
        tracing::info!(peer = %socket.peer(), "websocket closed");
    }
}

fn hello(ctx: &mut Context) -> HandlerFuture<'_> {
    Box::pin(async move {
        ctx.send_text("Hello world!").await?;
        Ok(true)
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let settings = match std::env::args().nth(1) {
        Some(path) => ServerSettings::load(path)?,
        None => ServerSettings::default(),
    };

    let mut chain = Chain::new();
    chain.mount(WsServer::new(WsSettings::default(), Echo));
    chain.mount(HandlerFn::new(hello));

    let server = HttpServer::new(settings, chain);

    tokio::select! {
        result = server.run() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    Ok(())
}
