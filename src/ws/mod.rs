//! WebSocket support: upgrade handshake, frame codec and the per-socket
//! read loop.

pub mod frame;
pub mod handshake;
pub mod socket;

pub use handshake::WsServer;
pub use socket::{Message, SocketHandler, WebSocket};
