//! A single accepted connection: one socket, one byte stream.

use crate::config::ServerSettings;
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::timeout;

/// The byte stream a connection runs over. Implemented by plain TCP
/// streams, TLS-wrapped streams and in-memory test streams alike.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}

/// One socket plus its buffered stream, owned by exactly one worker at a
/// time. Reads honor the configured timeout; writes go straight through.
/// The `closed` flag is set once the stream is known to be unusable and is
/// never cleared.
pub struct Connection {
    stream: BufReader<Box<dyn Transport>>,
    peer: SocketAddr,
    secure: bool,
    settings: ServerSettings,
    closed: bool,
}

impl Connection {
    pub fn new(
        stream: impl Transport + 'static,
        peer: SocketAddr,
        secure: bool,
        settings: ServerSettings,
    ) -> Self {
        Self {
            stream: BufReader::new(Box::new(stream)),
            peer,
            secure,
            settings,
            closed: false,
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn settings(&self) -> &ServerSettings {
        &self.settings
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn mark_closed(&mut self) {
        self.closed = true;
    }

    /// Read one byte, or `None` at end of stream.
    pub async fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        let read = timeout(self.settings.read_timeout(), self.stream.read(&mut byte))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "read timed out"))??;
        Ok((read == 1).then(|| byte[0]))
    }

    /// Fill the whole buffer from the stream.
    pub async fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        timeout(self.settings.read_timeout(), self.stream.read_exact(buf))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "read timed out"))??;
        Ok(())
    }

    pub async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.stream.write_all(data).await
    }

    pub async fn flush(&mut self) -> io::Result<()> {
        self.stream.flush().await
    }

    /// Surrender the underlying stream, for protocol upgrades that take
    /// the connection out of the HTTP request cycle.
    pub(crate) fn into_stream(self) -> BufReader<Box<dyn Transport>> {
        self.stream
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.peer)
            .field("secure", &self.secure)
            .field("closed", &self.closed)
            .finish()
    }
}
