//! Outpost - self-hosted HTTP and WebSocket server
//!
//! A small server that speaks HTTP/1.0 and 1.1, optionally over TLS,
//! directly on top of TCP sockets, with a WebSocket upgrade and framing
//! layer on the same connections.

pub mod config;
pub mod http;
pub mod middleware;
pub mod server;
pub mod ws;
