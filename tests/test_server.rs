use anyhow::anyhow;
use outpost::config::ServerSettings;
use outpost::http::context::Context;
use outpost::middleware::{Chain, HandlerFn, HandlerFuture};
use outpost::server::HttpServer;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Start a server with the given chain on an ephemeral port.
fn start(chain: Chain) -> SocketAddr {
    let settings = ServerSettings {
        port: 0,
        ..ServerSettings::default()
    };
    let server = HttpServer::new(settings, chain);
    let listener = server.bind().unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = server.serve_on(listener).await;
    });
    addr
}

fn hello(ctx: &mut Context) -> HandlerFuture<'_> {
    Box::pin(async move {
        ctx.send_text("Hello world!").await?;
        Ok(true)
    })
}

fn hello_chain() -> Chain {
    let mut chain = Chain::new();
    chain.mount(HandlerFn::new(hello));
    chain
}

/// Read one response: the head up to the blank line, then a body of
/// exactly `Content-Length` bytes.
async fn read_response(stream: &mut TcpStream) -> (String, Vec<u8>) {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        stream.read_exact(&mut byte).await.unwrap();
        head.push(byte[0]);
    }
    let head = String::from_utf8(head).unwrap();

    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().unwrap())
        })
        .unwrap_or(0);

    let mut body = vec![0u8; content_length];
    stream.read_exact(&mut body).await.unwrap();
    (head, body)
}

#[tokio::test]
async fn test_hello_world_scenario() {
    let addr = start(hello_chain());
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(b"GET /hello HTTP/1.1\r\nHost: x\r\n\r\n")
        .await
        .unwrap();

    let (head, body) = read_response(&mut stream).await;
    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(head.contains("\r\nContent-Length: 12\r\n"));
    assert_eq!(body, b"Hello world!");
}

#[tokio::test]
async fn test_keep_alive_serves_second_request() {
    let addr = start(hello_chain());
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(b"GET /first HTTP/1.1\r\nHost: x\r\n\r\n")
        .await
        .unwrap();
    let (head, body) = read_response(&mut stream).await;
    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
    assert_eq!(body, b"Hello world!");

    // no Connection header was sent, so the same connection takes another
    // request
    stream
        .write_all(b"GET /second HTTP/1.1\r\nHost: x\r\n\r\n")
        .await
        .unwrap();
    let (head, body) = read_response(&mut stream).await;
    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
    assert_eq!(body, b"Hello world!");
}

#[tokio::test]
async fn test_connection_close_is_honored() {
    let addr = start(hello_chain());
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let (head, body) = read_response(&mut stream).await;
    assert!(head.contains("\r\nConnection: close\r\n"));
    assert_eq!(body, b"Hello world!");

    // the server closes after the response
    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn test_unclaimed_request_gets_404() {
    let addr = start(Chain::new());
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(b"GET /nowhere HTTP/1.1\r\nHost: x\r\n\r\n")
        .await
        .unwrap();

    let (head, body) = read_response(&mut stream).await;
    assert!(head.starts_with("HTTP/1.1 404 Not Found\r\n"));
    assert!(head.contains("\r\nContent-Length: 0\r\n"));
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_malformed_request_gets_no_response() {
    let addr = start(hello_chain());
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream.write_all(b"BOGUS\r\n\r\n").await.unwrap();

    let mut bytes = Vec::new();
    stream.read_to_end(&mut bytes).await.unwrap();
    assert!(bytes.is_empty(), "malformed requests are dropped silently");
}

fn failing(_ctx: &mut Context) -> HandlerFuture<'_> {
    Box::pin(async move { Err(anyhow!("boom")) })
}

#[tokio::test]
async fn test_failing_handler_reports_500_with_local_detail() {
    let mut chain = Chain::new();
    chain.mount(HandlerFn::new(failing));
    let addr = start(chain);
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n")
        .await
        .unwrap();

    let (head, body) = read_response(&mut stream).await;
    assert!(head.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
    // loopback callers see the error chain
    assert_eq!(body, b"boom");
}

fn api_handler(ctx: &mut Context) -> HandlerFuture<'_> {
    Box::pin(async move {
        ctx.send_text("api").await?;
        Ok(true)
    })
}

fn default_handler(ctx: &mut Context) -> HandlerFuture<'_> {
    Box::pin(async move {
        ctx.send_text("default").await?;
        Ok(true)
    })
}

#[tokio::test]
async fn test_virtual_host_dispatch() {
    let mut chain = Chain::new();
    chain.mount_host("api.example.com", HandlerFn::new(api_handler));
    chain.mount(HandlerFn::new(default_handler));
    let addr = start(chain);

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: api.example.com\r\n\r\n")
        .await
        .unwrap();
    let (_, body) = read_response(&mut stream).await;
    assert_eq!(body, b"api");

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: other.example.com\r\n\r\n")
        .await
        .unwrap();
    let (_, body) = read_response(&mut stream).await;
    assert_eq!(body, b"default");
}

mod websocket {
    use super::*;
    use async_trait::async_trait;
    use outpost::config::WsSettings;
    use outpost::ws::{Message, SocketHandler, WebSocket, WsServer};
    use std::sync::Arc;

    struct Echo;

    #[async_trait]
    impl SocketHandler for Echo {
        async fn on_message(&self, socket: &Arc<WebSocket>, message: Message) {
            let _ = match &message {
                Message::Text(text) => socket.send_text(text).await,
                Message::Binary(data) => socket.send_binary(data).await,
            };
        }
    }

    fn ws_chain() -> Chain {
        let mut chain = Chain::new();
        chain.mount(WsServer::new(WsSettings::default(), Echo));
        chain
    }

    #[tokio::test]
    async fn test_upgrade_and_echo_over_tcp() {
        let addr = start(ws_chain());
        let mut stream = TcpStream::connect(addr).await.unwrap();

        stream
            .write_all(
                b"GET /chat HTTP/1.1\r\n\
                  Host: x\r\n\
                  Upgrade: websocket\r\n\
                  Connection: Upgrade\r\n\
                  Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
                  Sec-WebSocket-Version: 13\r\n\
                  \r\n",
            )
            .await
            .unwrap();

        let (head, _) = read_response(&mut stream).await;
        assert!(head.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        assert!(head.contains("\r\nSec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));

        // masked "Hello" text frame
        stream
            .write_all(&[
                0x81, 0x85, 0x37, 0xFA, 0x21, 0x3D, 0x7F, 0x9F, 0x4D, 0x51, 0x58,
            ])
            .await
            .unwrap();

        let mut echoed = [0u8; 7];
        stream.read_exact(&mut echoed).await.unwrap();
        assert_eq!(&echoed, b"\x81\x05Hello");

        // close handshake
        stream.write_all(&[0x88, 0x80, 0, 0, 0, 0]).await.unwrap();
        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, [0x88, 0x00]);
    }
}
