//! Raw buffered HTTP exchange as delivered by the transport layer.
//!
//! The transport buffers the whole request body before handing the exchange
//! over, so nothing in here performs I/O. The response accumulates its body
//! in memory and is written back by the transport once the dispatch
//! pipeline has finalized it.

use bytes::{Bytes, BytesMut};

/// HTTP status code with a canonical reason phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(u16);

impl Status {
    pub const OK: Status = Status(200);
    pub const BAD_REQUEST: Status = Status(400);
    pub const NOT_FOUND: Status = Status(404);
    pub const INTERNAL_SERVER_ERROR: Status = Status(500);
    pub const SERVICE_UNAVAILABLE: Status = Status(503);

    pub const fn from_code(code: u16) -> Self {
        Self(code)
    }

    pub fn code(&self) -> u16 {
        self.0
    }

    pub fn reason(&self) -> &'static str {
        match self.0 {
            200 => "OK",
            400 => "Bad Request",
            401 => "Unauthorized",
            404 => "Not Found",
            415 => "Unsupported Media Type",
            500 => "Internal Server Error",
            503 => "Service Unavailable",
            _ => "",
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.0)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.0, self.reason())
    }
}

/// Request method. Only GET and POST carry procedure calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Other(String),
}

impl HttpMethod {
    pub fn parse(method: &str) -> Self {
        if method.eq_ignore_ascii_case("GET") {
            Self::Get
        } else if method.eq_ignore_ascii_case("POST") {
            Self::Post
        } else {
            Self::Other(method.to_ascii_uppercase())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Other(m) => m,
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered header list with case-insensitive lookup.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Append a header, keeping earlier values with the same name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Replace every value of `name` with a single one.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.entries.push((name, value.into()));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Split a `Content-Type` value into its lowercase MIME type and the
/// `charset` parameter, if any.
pub fn split_content_type(value: &str) -> (String, Option<String>) {
    let mut parts = value.split(';');
    let mime = parts.next().unwrap_or("").trim().to_ascii_lowercase();
    let charset = parts.find_map(|p| {
        let (key, val) = p.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("charset") {
            Some(val.trim().trim_matches('"').to_string())
        } else {
            None
        }
    });
    (mime, charset)
}

/// A fully buffered incoming request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    /// Resource path without the query string.
    pub path: String,
    /// Query string without the leading `?`.
    pub query: Option<String>,
    /// Protocol version as sent on the wire, e.g. `HTTP/1.1`.
    pub version: String,
    pub headers: Headers,
    pub body: Bytes,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            version: "HTTP/1.1".into(),
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    /// Build from a request target such as `/api/sum?a=1`.
    pub fn from_target(method: HttpMethod, target: &str) -> Self {
        match target.split_once('?') {
            Some((path, query)) => Self::new(method, path).with_query(query),
            None => Self::new(method, target),
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Path plus query string, as the client addressed it.
    pub fn target(&self) -> String {
        match &self.query {
            Some(q) => format!("{}?{}", self.path, q),
            None => self.path.clone(),
        }
    }

    /// Lowercase MIME type of the body, without parameters.
    pub fn content_type(&self) -> Option<String> {
        self.header("content-type").map(|v| split_content_type(v).0)
    }

    /// Declared `charset` parameter of the content type.
    pub fn character_encoding(&self) -> Option<String> {
        self.header("content-type").and_then(|v| split_content_type(v).1)
    }

    /// Whether the client expects the connection to persist after this
    /// exchange.
    pub fn keep_alive(&self) -> bool {
        if let Some(value) = self.header("connection") {
            let tokens = value.split(',').map(str::trim);
            for token in tokens {
                if token.eq_ignore_ascii_case("close") {
                    return false;
                }
                if token.eq_ignore_ascii_case("keep-alive") {
                    return true;
                }
            }
        }
        !self.version.eq_ignore_ascii_case("HTTP/1.0")
    }
}

/// A response under construction.
///
/// Status and headers stay mutable until the transport writes them out; the
/// body is write-once in the sense that nothing may be appended after
/// [`HttpResponse::close`].
#[derive(Debug, Clone)]
pub struct HttpResponse {
    status: Status,
    headers: Headers,
    body: BytesMut,
    body_limit: Option<usize>,
    closed: bool,
}

impl HttpResponse {
    pub fn new(status: Status) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: BytesMut::new(),
            body_limit: None,
            closed: false,
        }
    }

    /// The default `200 OK` shell.
    pub fn ok() -> Self {
        Self::new(Status::OK)
    }

    /// Cap the body size; writes beyond the cap fail.
    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = Some(limit);
        self
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn set_status(&mut self, status: Status) {
        self.status = status;
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.set(name, value);
    }

    /// Append bytes to the body.
    pub fn write(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        if self.closed {
            return Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "response is closed",
            ));
        }
        if let Some(limit) = self.body_limit {
            if self.body.len() + bytes.len() > limit {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    format!("response body exceeds {limit} bytes"),
                ));
            }
        }
        self.body.extend_from_slice(bytes);
        Ok(())
    }

    pub fn bytes_written(&self) -> usize {
        self.body.len()
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Split into parts for the transport to write out.
    pub fn into_parts(self) -> (Status, Headers, Bytes) {
        (self.status, self.headers, self.body.freeze())
    }
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self::ok()
    }
}

/// The transport connection an exchange arrived on.
pub trait Connection: Send + Sync {
    /// Identifier used in logs.
    fn id(&self) -> &str;

    /// Ask the transport to close the connection once the current response
    /// has been written.
    fn close(&self);

    fn is_closed(&self) -> bool;
}
