//! Byte-level request head parser.
//!
//! Reads the connection one byte at a time into a line buffer bounded by
//! the configured maximum line size, cutting lines at CRLF. The first line
//! must match `METHOD SP /target SP HTTP/1.0|1.1`; the rest are headers
//! split at the first colon until a blank line ends the head.

use crate::http::connection::Connection;
use crate::http::fields::Fields;
use crate::http::request::{Method, RequestHead, Version};
use bytes::{BufMut, BytesMut};
use std::fmt;
use std::io;

#[derive(Debug)]
pub enum ParseError {
    /// The peer closed an idle connection before sending anything.
    Closed,
    /// The stream ended in the middle of a request head.
    UnexpectedEof,
    /// A read exceeded the configured timeout.
    TimedOut,
    /// A line grew past the configured maximum before its CRLF.
    LineTooLong,
    /// More headers than the configured maximum.
    TooManyHeaders,
    /// The first line does not match the request-line grammar.
    BadRequestLine,
    /// A header line without a colon, or with non-UTF-8 bytes.
    BadHeader,
    Io(io::Error),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Closed => write!(f, "connection closed"),
            ParseError::UnexpectedEof => write!(f, "connection closed mid-request"),
            ParseError::TimedOut => write!(f, "read timed out"),
            ParseError::LineTooLong => write!(f, "request line or header too long"),
            ParseError::TooManyHeaders => write!(f, "too many headers"),
            ParseError::BadRequestLine => write!(f, "malformed request line"),
            ParseError::BadHeader => write!(f, "malformed header"),
            ParseError::Io(e) => write!(f, "read failed: {e}"),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<io::Error> for ParseError {
    fn from(error: io::Error) -> Self {
        if error.kind() == io::ErrorKind::TimedOut {
            ParseError::TimedOut
        } else {
            ParseError::Io(error)
        }
    }
}

/// Read one request head from the connection.
///
/// Any error leaves the stream in an unknown position; the caller must not
/// reuse the connection after a failure.
pub async fn read_request_head(conn: &mut Connection) -> Result<RequestHead, ParseError> {
    let max_line_size = conn.settings().max_line_size;
    let max_header_count = conn.settings().max_header_count;

    let mut line = BytesMut::with_capacity(256);
    let mut request_line: Option<(Method, String, Version)> = None;
    let mut headers = Fields::new();
    let mut header_count = 0usize;
    let mut started = false;

    loop {
        if line.len() >= max_line_size {
            return Err(ParseError::LineTooLong);
        }
        let Some(byte) = conn.read_byte().await? else {
            return Err(if started {
                ParseError::UnexpectedEof
            } else {
                ParseError::Closed
            });
        };
        started = true;

        if byte == b'\n' && line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
            if line.is_empty() {
                // blank line: end of head, or garbage before the request line
                let (method, target, version) =
                    request_line.ok_or(ParseError::BadRequestLine)?;
                return Ok(RequestHead {
                    method,
                    target,
                    version,
                    headers,
                });
            }
            let text = std::str::from_utf8(&line).map_err(|_| {
                if request_line.is_none() {
                    ParseError::BadRequestLine
                } else {
                    ParseError::BadHeader
                }
            })?;
            if request_line.is_none() {
                request_line = Some(parse_request_line(text)?);
            } else if header_count >= max_header_count {
                return Err(ParseError::TooManyHeaders);
            } else {
                let (name, value) = text.split_once(':').ok_or(ParseError::BadHeader)?;
                headers.set(name, value.trim_start());
                header_count += 1;
            }
            line.clear();
        } else {
            line.put_u8(byte);
        }
    }
}

fn parse_request_line(line: &str) -> Result<(Method, String, Version), ParseError> {
    let mut parts = line.split(' ');
    let method = parts.next().ok_or(ParseError::BadRequestLine)?;
    let target = parts.next().ok_or(ParseError::BadRequestLine)?;
    let protocol = parts.next().ok_or(ParseError::BadRequestLine)?;
    if parts.next().is_some() {
        return Err(ParseError::BadRequestLine);
    }

    let method = Method::parse(method).ok_or(ParseError::BadRequestLine)?;
    if !target.starts_with('/') || target.chars().any(|c| c.is_ascii_whitespace()) {
        return Err(ParseError::BadRequestLine);
    }
    let version = match protocol {
        "HTTP/1.0" => Version::Http10,
        "HTTP/1.1" => Version::Http11,
        _ => return Err(ParseError::BadRequestLine),
    };
    Ok((method, target.to_string(), version))
}
