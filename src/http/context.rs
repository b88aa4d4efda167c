//! Per-request context: one request, one response, one connection.
//!
//! The context guards the two protocol invariants of a request's lifetime:
//! exactly one header block reaches the wire, and the context resolves
//! exactly once into a disposition that either reuses the connection for
//! the next request or disposes of it.

use crate::http::connection::Connection;
use crate::http::fields::Fields;
use crate::http::request::{Method, Request, RequestHead};
use crate::http::response::{Response, StatusCode};
use anyhow::{Result, anyhow};
use std::time::SystemTime;

/// What becomes of the connection once a context is finished.
#[derive(Debug)]
pub enum Disposition {
    /// Read the next request on the same connection.
    KeepAlive(Connection),
    /// Dispose of the connection.
    Close,
    /// A handler took the connection out of the HTTP cycle (protocol
    /// upgrade); it is no longer this worker's concern.
    Detached,
}

/// Lifecycle of a context. Transitions are monotonic and happen under the
/// single worker that owns the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// No header bytes sent, context live.
    Ready,
    /// Header block on the wire, context live.
    HeaderSent,
    /// Released after the header block was sent.
    Released,
    /// Released without a header block ever reaching the wire.
    Aborted,
}

pub struct Context {
    conn: Option<Connection>,
    request: Request,
    response: Response,
    phase: Phase,
    form: Option<Fields>,
}

impl Context {
    /// Bind a parsed request head to the connection it arrived on.
    pub fn new(conn: Connection, head: RequestHead) -> Self {
        let secure = conn.is_secure();
        let request = Request::new(head, conn.peer(), secure);
        let request_cookies = request.cookies().clone();
        let wants_close = request
            .header("Connection")
            .is_some_and(|v| v.eq_ignore_ascii_case("close"));
        let response = Response::new(request.version(), request_cookies, secure, wants_close);
        Self {
            conn: Some(conn),
            request,
            response,
            phase: Phase::Ready,
            form: None,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    /// Whether the header block has been written.
    pub fn header_sent(&self) -> bool {
        matches!(self.phase, Phase::HeaderSent | Phase::Released)
    }

    pub fn is_released(&self) -> bool {
        matches!(self.phase, Phase::Released | Phase::Aborted)
    }

    /// Whether the connection is still usable for writes.
    pub fn is_closed(&self) -> bool {
        self.conn.as_ref().is_none_or(|c| c.is_closed())
    }

    /// Mark the connection unusable so release disposes of it.
    pub fn abort(&mut self) {
        if let Some(conn) = self.conn.as_mut() {
            conn.mark_closed();
        }
    }

    /// Write the response header block, once. Later calls are no-ops.
    ///
    /// The block is composed in full and transmitted as a single write:
    /// status line, `Date`, one `Set-Cookie` per response cookie, the
    /// response headers, and the blank line that separates the head from
    /// the body.
    pub async fn write_header(&mut self) -> Result<()> {
        if self.phase != Phase::Ready {
            return Ok(());
        }
        let head = compose_head(&self.response);
        self.phase = Phase::HeaderSent;
        let conn = self.conn_mut()?;
        conn.write_all(&head).await?;
        Ok(())
    }

    /// Write body bytes, emitting the header block first when it is still
    /// pending. An empty body still writes and flushes the header, which
    /// is how header-only responses are sent.
    ///
    /// A stream failure marks the connection closed and releases the
    /// context before the error is returned.
    pub async fn write(&mut self, body: &[u8]) -> Result<()> {
        if self.is_closed() {
            return Err(anyhow!("connection is closed"));
        }
        let result = self.write_inner(body).await;
        if result.is_err() {
            self.abort();
            self.release().await;
        }
        result
    }

    async fn write_inner(&mut self, body: &[u8]) -> Result<()> {
        let header_pending = self.phase == Phase::Ready;
        if header_pending {
            self.write_header().await?;
            if body.is_empty() {
                self.conn_mut()?.flush().await?;
            }
        }
        if !body.is_empty() {
            let conn = self.conn_mut()?;
            conn.write_all(body).await?;
            conn.flush().await?;
        }
        Ok(())
    }

    /// Write a text body. See [`Context::write`].
    pub async fn write_text(&mut self, text: &str) -> Result<()> {
        self.write(text.as_bytes()).await
    }

    /// Write a body and finish the request. Sets `Content-Length` from the
    /// payload before anything reaches the wire. Always releases, even
    /// when the write fails.
    pub async fn send(&mut self, body: &[u8]) -> Result<()> {
        if !body.is_empty() {
            self.response.set_content_length(body.len());
        }
        let result = self.write(body).await;
        self.release().await;
        result
    }

    /// Send a text body. See [`Context::send`].
    pub async fn send_text(&mut self, text: &str) -> Result<()> {
        self.send(text.as_bytes()).await
    }

    /// Finish the request. Idempotent.
    ///
    /// When no header block was written and the connection is still
    /// usable, a header-only response goes out as a safety net so every
    /// accepted request is answered: the status falls back to 400 if it
    /// was never moved off the default, and `Content-Length` is forced
    /// to 0.
    pub async fn release(&mut self) {
        if self.is_released() {
            return;
        }
        if self.phase == Phase::Ready && !self.is_closed() {
            if self.response.status() == StatusCode::Ok {
                self.response.set_status(StatusCode::BadRequest);
            }
            self.response.set_content_length(0);
            let head = compose_head(&self.response);
            self.phase = Phase::HeaderSent;
            if let Some(conn) = self.conn.as_mut() {
                let ok = conn.write_all(&head).await.is_ok() && conn.flush().await.is_ok();
                if !ok {
                    conn.mark_closed();
                }
            }
        }
        self.phase = if self.phase == Phase::HeaderSent {
            Phase::Released
        } else {
            Phase::Aborted
        };
    }

    /// Take the connection out of the context for a protocol upgrade. The
    /// context counts as released afterwards.
    pub fn detach(&mut self) -> Result<Connection> {
        let conn = self
            .conn
            .take()
            .ok_or_else(|| anyhow!("connection already detached"))?;
        self.phase = if self.phase == Phase::Ready {
            Phase::Aborted
        } else {
            Phase::Released
        };
        Ok(conn)
    }

    /// Resolve the finished context into what happens to the connection
    /// next. Callers release first; an unreleased context disposes of the
    /// connection.
    pub fn finish(mut self) -> Disposition {
        let released = self.is_released();
        match self.conn.take() {
            None => Disposition::Detached,
            Some(conn) => {
                if !released || conn.is_closed() || !self.response.keep_alive() {
                    Disposition::Close
                } else {
                    Disposition::KeepAlive(conn)
                }
            }
        }
    }

    /// The url-encoded form body, read and decoded on first access.
    ///
    /// Only POST and PUT requests with a `application/x-www-form-urlencoded`
    /// content type and a content length inside the configured bound are
    /// read. Anything else, including a truncated body, yields an empty
    /// collection rather than an error.
    pub async fn form(&mut self) -> &Fields {
        if self.form.is_none() {
            let fields = self.read_form_body().await;
            self.form = Some(fields);
        }
        self.form.get_or_insert_with(Fields::new)
    }

    async fn read_form_body(&mut self) -> Fields {
        let mut fields = Fields::new();
        if !matches!(self.request.method(), Method::Post | Method::Put) {
            return fields;
        }
        if !self
            .request
            .content_type()
            .is_some_and(|t| t.eq_ignore_ascii_case("application/x-www-form-urlencoded"))
        {
            return fields;
        }
        let Some(length) = self.request.content_length() else {
            return fields;
        };
        let Some(conn) = self.conn.as_mut() else {
            return fields;
        };
        if length == 0 || length >= conn.settings().max_form_size {
            return fields;
        }
        let mut body = vec![0u8; length];
        if conn.read_exact(&mut body).await.is_err() {
            return fields;
        }
        for (name, value) in url::form_urlencoded::parse(&body) {
            fields.set(name.into_owned(), value.into_owned());
        }
        fields
    }

    fn conn_mut(&mut self) -> Result<&mut Connection> {
        self.conn
            .as_mut()
            .ok_or_else(|| anyhow!("connection detached"))
    }
}

/// Compose the full response header block, blank-line terminator included.
fn compose_head(response: &Response) -> Vec<u8> {
    let mut head = String::with_capacity(256);
    head.push_str("HTTP/");
    head.push_str(response.version().as_str());
    head.push(' ');
    head.push_str(&response.status().as_u16().to_string());
    head.push(' ');
    head.push_str(response.status().reason_phrase());
    head.push_str("\r\n");
    head.push_str("Date: ");
    head.push_str(&httpdate::fmt_http_date(SystemTime::now()));
    head.push_str("\r\n");
    for cookie in response.cookies().iter() {
        head.push_str("Set-Cookie: ");
        head.push_str(&cookie.to_string());
        head.push_str("\r\n");
    }
    for (name, value) in response.headers().iter() {
        head.push_str(name);
        head.push_str(": ");
        head.push_str(value);
        head.push_str("\r\n");
    }
    head.push_str("\r\n");
    head.into_bytes()
}
