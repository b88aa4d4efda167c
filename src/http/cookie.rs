//! HTTP cookies and the per-response cookie jar.

use crate::http::fields::Fields;
use std::fmt;
use std::time::SystemTime;

/// A response cookie.
///
/// Serializes in `Set-Cookie` form: the escaped `name=value` pair followed
/// by the attributes that have been set.
///
/// # Example
///
/// ```
/// # use outpost::http::cookie::Cookie;
/// let mut cookie = Cookie::new("session", "abc 123");
/// cookie.http_only = true;
/// assert_eq!(cookie.to_string(), "session=abc+123; HttpOnly");
/// ```
#[derive(Debug, Clone)]
pub struct Cookie {
    name: String,
    value: String,
    /// Domain for which the cookie applies.
    pub domain: Option<String>,
    /// Path for which the cookie applies. Serialized with a leading slash.
    pub path: Option<String>,
    /// Expiration date, serialized as an HTTP-date.
    pub expires: Option<SystemTime>,
    /// Marks the cookie inaccessible to scripts.
    pub http_only: bool,
    /// Restricts the cookie to TLS connections.
    pub secure: bool,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
            expires: None,
            http_only: false,
            secure: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, escape(&self.value))?;
        if let Some(domain) = &self.domain {
            write!(f, "; Domain={domain}")?;
        }
        if let Some(expires) = self.expires {
            write!(f, "; Expires={}", httpdate::fmt_http_date(expires))?;
        }
        if self.http_only {
            write!(f, "; HttpOnly")?;
        }
        if let Some(path) = &self.path {
            if path.starts_with('/') {
                write!(f, "; Path={path}")?;
            } else {
                write!(f, "; Path=/{path}")?;
            }
        }
        if self.secure {
            write!(f, "; Secure")?;
        }
        Ok(())
    }
}

/// Escape a cookie value for the wire.
pub(crate) fn escape(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Reverse [`escape`]: `+` becomes a space and percent escapes are decoded.
pub(crate) fn unescape(raw: &str) -> String {
    // Feed the component through the form decoder as the value of a
    // synthetic pair. A literal ampersand would split the pair, so it is
    // escaped up front; a literal equals sign is safe because the decoder
    // only splits on the first one.
    let raw = raw.replace('&', "%26");
    url::form_urlencoded::parse(format!("v={raw}").as_bytes())
        .next()
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default()
}

/// Parse a request `Cookie` header into name/value pairs.
///
/// Pairs are split on `;`, each pair on its first `=`. Names are trimmed of
/// leading whitespace and values are unescaped. The last occurrence of a
/// name wins.
pub fn parse_header(header: &str) -> Fields {
    let mut fields = Fields::new();
    for piece in header.split(';') {
        if let Some((name, value)) = piece.split_once('=') {
            fields.set(name.trim_start(), unescape(value));
        }
    }
    fields
}

/// The cookies attached to a response.
///
/// Looking up a name that is not yet present creates the cookie with
/// `HttpOnly` set, `Secure` matching the server's TLS state, and the value
/// of the request cookie with the same name when one was sent.
#[derive(Debug)]
pub struct CookieJar {
    cookies: Vec<Cookie>,
    request_values: Fields,
    secure: bool,
}

impl CookieJar {
    pub(crate) fn new(request_values: Fields, secure: bool) -> Self {
        Self {
            cookies: Vec::new(),
            request_values,
            secure,
        }
    }

    /// Get the cookie with the given name, creating it when absent.
    pub fn at(&mut self, name: &str) -> &mut Cookie {
        if let Some(index) = self
            .cookies
            .iter()
            .position(|c| c.name().eq_ignore_ascii_case(name))
        {
            return &mut self.cookies[index];
        }
        let mut cookie = Cookie::new(name, "");
        cookie.http_only = true;
        cookie.secure = self.secure;
        if let Some(value) = self.request_values.get(name) {
            cookie.set_value(value);
        }
        self.cookies.push(cookie);
        let index = self.cookies.len() - 1;
        &mut self.cookies[index]
    }

    pub fn get(&self, name: &str) -> Option<&Cookie> {
        self.cookies
            .iter()
            .find(|c| c.name().eq_ignore_ascii_case(name))
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Iterate in insertion order, which is the `Set-Cookie` emission order.
    pub fn iter(&self) -> impl Iterator<Item = &Cookie> {
        self.cookies.iter()
    }
}
