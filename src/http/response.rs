//! HTTP response state.

use crate::http::cookie::CookieJar;
use crate::http::fields::Fields;
use crate::http::request::Version;

/// HTTP status codes emitted by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 101 Switching Protocols
    SwitchingProtocols,
    /// 200 OK
    Ok,
    /// 201 Created
    Created,
    /// 204 No Content
    NoContent,
    /// 301 Moved Permanently
    MovedPermanently,
    /// 400 Bad Request
    BadRequest,
    /// 404 Not Found
    NotFound,
    /// 405 Method Not Allowed
    MethodNotAllowed,
    /// 500 Internal Server Error
    InternalServerError,
}

impl StatusCode {
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::SwitchingProtocols => 101,
            StatusCode::Ok => 200,
            StatusCode::Created => 201,
            StatusCode::NoContent => 204,
            StatusCode::MovedPermanently => 301,
            StatusCode::BadRequest => 400,
            StatusCode::NotFound => 404,
            StatusCode::MethodNotAllowed => 405,
            StatusCode::InternalServerError => 500,
        }
    }

    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::SwitchingProtocols => "Switching Protocols",
            StatusCode::Ok => "OK",
            StatusCode::Created => "Created",
            StatusCode::NoContent => "No Content",
            StatusCode::MovedPermanently => "Moved Permanently",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::NotFound => "Not Found",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
            StatusCode::InternalServerError => "Internal Server Error",
        }
    }
}

/// The mutable response half of a request context.
///
/// Holds the status, headers and cookies until the context writes the
/// header block. Keep-alive is carried as a header: a response closes the
/// connection exactly when the protocol is HTTP/1.0 or the `Connection`
/// header says `close`.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    version: Version,
    headers: Fields,
    cookies: CookieJar,
}

impl Response {
    pub(crate) fn new(
        version: Version,
        request_cookies: Fields,
        secure: bool,
        request_wants_close: bool,
    ) -> Self {
        let mut response = Self {
            status: StatusCode::Ok,
            version,
            headers: Fields::new(),
            cookies: CookieJar::new(request_cookies, secure),
        };
        if request_wants_close {
            response.set_keep_alive(false);
        }
        response
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub(crate) fn version(&self) -> Version {
        self.version
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.set(name, value);
    }

    pub fn remove_header(&mut self, name: &str) -> Option<String> {
        self.headers.remove(name)
    }

    pub fn headers(&self) -> &Fields {
        &self.headers
    }

    /// The declared body length, or 0 when unset.
    pub fn content_length(&self) -> usize {
        self.headers
            .get("Content-Length")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    pub fn set_content_length(&mut self, length: usize) {
        self.headers.set("Content-Length", length.to_string());
    }

    pub fn set_content_type(&mut self, content_type: &str) {
        self.headers.set("Content-Type", content_type);
    }

    /// Point the client at another location with a permanent redirect.
    pub fn redirect(&mut self, location: &str) {
        self.status = StatusCode::MovedPermanently;
        self.headers.set("Location", location);
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    pub fn cookies_mut(&mut self) -> &mut CookieJar {
        &mut self.cookies
    }

    /// Whether the connection may be reused for another request once this
    /// response is finished.
    pub fn keep_alive(&self) -> bool {
        self.version == Version::Http11
            && !self
                .headers
                .get("Connection")
                .is_some_and(|v| v.eq_ignore_ascii_case("close"))
    }

    /// Request or refuse connection reuse. Only meaningful for HTTP/1.1;
    /// an HTTP/1.0 connection never persists.
    pub fn set_keep_alive(&mut self, keep_alive: bool) {
        if self.version == Version::Http11 {
            if keep_alive {
                self.headers.remove("Connection");
            } else {
                self.headers.set("Connection", "close");
            }
        }
    }
}
