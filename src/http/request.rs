//! HTTP request view.

use crate::http::cookie;
use crate::http::fields::Fields;
use std::cell::OnceCell;
use std::fmt;
use std::net::SocketAddr;

/// HTTP request methods accepted by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Connect,
    Delete,
    Get,
    Head,
    Options,
    Post,
    Put,
    Trace,
}

impl Method {
    /// Parses a method token. Methods are matched case-sensitively in their
    /// uppercase wire form.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "CONNECT" => Some(Method::Connect),
            "DELETE" => Some(Method::Delete),
            "GET" => Some(Method::Get),
            "HEAD" => Some(Method::Head),
            "OPTIONS" => Some(Method::Options),
            "POST" => Some(Method::Post),
            "PUT" => Some(Method::Put),
            "TRACE" => Some(Method::Trace),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Connect => "CONNECT",
            Method::Delete => "DELETE",
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Trace => "TRACE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP protocol versions the server speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Http10,
    Http11,
}

impl Version {
    pub fn as_str(&self) -> &'static str {
        match self {
            Version::Http10 => "1.0",
            Version::Http11 => "1.1",
        }
    }
}

/// The product of a successful request-head parse: method, target, version
/// and headers, before the request is bound to a connection.
#[derive(Debug)]
pub struct RequestHead {
    pub method: Method,
    pub target: String,
    pub version: Version,
    pub headers: Fields,
}

/// A parsed request as seen by handlers.
///
/// Query variables and cookies are decoded lazily on first access. The
/// request body stays on the connection and is consumed through the
/// context (see `Context::form`).
#[derive(Debug)]
pub struct Request {
    method: Method,
    target: String,
    version: Version,
    headers: Fields,
    peer: SocketAddr,
    secure: bool,
    query: OnceCell<Fields>,
    cookies: OnceCell<Fields>,
}

impl Request {
    pub(crate) fn new(head: RequestHead, peer: SocketAddr, secure: bool) -> Self {
        Self {
            method: head.method,
            target: head.target,
            version: head.version,
            headers: head.headers,
            peer,
            secure,
            query: OnceCell::new(),
            cookies: OnceCell::new(),
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// The raw request target: path plus query string.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The target up to the query string.
    pub fn path(&self) -> &str {
        match self.target.split_once('?') {
            Some((path, _)) => path,
            None => &self.target,
        }
    }

    /// The query string after `?`, without the separator.
    pub fn query_string(&self) -> &str {
        match self.target.split_once('?') {
            Some((_, query)) => query,
            None => "",
        }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Look up a header value, ignoring name case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn headers(&self) -> &Fields {
        &self.headers
    }

    /// The `Host` header with any port suffix removed, or the empty string.
    pub fn host(&self) -> &str {
        let Some(host) = self.headers.get("Host") else {
            return "";
        };
        if let Some(end) = host.find(']') {
            // bracketed IPv6 literal
            return &host[..=end];
        }
        match host.split_once(':') {
            Some((name, _)) => name,
            None => host,
        }
    }

    /// Decoded query variables. Percent escapes and `+` are decoded; the
    /// last occurrence of a name wins.
    pub fn query(&self) -> &Fields {
        self.query.get_or_init(|| {
            let mut fields = Fields::new();
            for (name, value) in url::form_urlencoded::parse(self.query_string().as_bytes()) {
                fields.set(name.into_owned(), value.into_owned());
            }
            fields
        })
    }

    /// Cookies sent with the request, as decoded name/value pairs.
    pub fn cookies(&self) -> &Fields {
        self.cookies.get_or_init(|| {
            self.headers
                .get("Cookie")
                .map(cookie::parse_header)
                .unwrap_or_default()
        })
    }

    /// The `Content-Length` header when present and numeric.
    pub fn content_length(&self) -> Option<usize> {
        self.headers.get("Content-Length")?.trim().parse().ok()
    }

    /// The media type of the body, without any parameters.
    pub fn content_type(&self) -> Option<&str> {
        let header = self.headers.get("Content-Type")?;
        Some(match header.split_once(';') {
            Some((mime, _)) => mime.trim_end(),
            None => header,
        })
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.headers.get("User-Agent")
    }

    pub fn referer(&self) -> Option<&str> {
        self.headers.get("Referer")
    }

    /// The accepted media types, split on commas.
    pub fn accept(&self) -> Vec<&str> {
        self.headers
            .get("Accept")
            .map(|h| h.split(',').map(str::trim).collect())
            .unwrap_or_default()
    }

    /// Address of the remote peer.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Whether the peer connected from a loopback address.
    pub fn is_local(&self) -> bool {
        self.peer.ip().is_loopback()
    }

    /// Whether the connection carrying this request is TLS.
    pub fn is_secure(&self) -> bool {
        self.secure
    }
}
