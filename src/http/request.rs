use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

/// Upload header carrying the base64-encoded file name.
pub const FILENAME_HEADER: &str = "FileName";
/// Upload header selecting the storage tier (`low` or `deep`).
pub const STORAGE_TYPE_HEADER: &str = "StorageType";

/// HTTP request methods.
///
/// Only GET and POST are served; anything else is rejected by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET - Retrieve a resource
    GET,
    /// POST - Upload, login or registration
    POST,
}

impl Method {
    /// Parses an HTTP method, ignoring ASCII case.
    ///
    /// # Example
    ///
    /// ```
    /// # use tierserve::http::request::Method;
    /// assert_eq!(Method::from_str("GET"), Some(Method::GET));
    /// assert_eq!(Method::from_str("post"), Some(Method::POST));
    /// assert_eq!(Method::from_str("PUT"), None);
    /// ```
    pub fn from_str(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("GET") {
            Some(Method::GET)
        } else if s.eq_ignore_ascii_case("POST") {
            Some(Method::POST)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
        }
    }
}

/// Represents a parsed HTTP request from a client.
///
/// `path` is already normalised: scheme and host stripped, query removed,
/// and a bare `/` replaced by the default document.
#[derive(Debug, Clone)]
pub struct Request {
    /// The HTTP method (GET or POST)
    pub method: Method,
    /// The request path (e.g., "/index.html")
    pub path: String,
    /// HTTP version (always "HTTP/1.1" once parsed)
    pub version: String,
    /// Request headers as sent, trimmed
    pub headers: HashMap<String, String>,
    /// Request body, exactly `Content-Length` bytes
    pub body: Vec<u8>,
}

/// Builder for constructing Request objects.
pub struct RequestBuilder {
    method: Option<Method>,
    path: Option<String>,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self {
            method: None,
            path: None,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn build(self) -> Result<Request, &'static str> {
        Ok(Request {
            method: self.method.ok_or("method missing")?,
            path: self.path.ok_or("path missing")?,
            version: "HTTP/1.1".to_string(),
            headers: self.headers,
            body: self.body,
        })
    }
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Request {
    /// Retrieves a header value by name, ignoring ASCII case.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// True only when the client sent `Connection: keep-alive`.
    pub fn keep_alive(&self) -> bool {
        self.header("Connection")
            .is_some_and(|v| v.eq_ignore_ascii_case("keep-alive"))
    }

    /// Decoded `FileName` header. `None` if absent or not valid base64/UTF-8.
    pub fn upload_filename(&self) -> Option<String> {
        let raw = self.header(FILENAME_HEADER)?;
        let bytes = BASE64.decode(raw.trim()).ok()?;
        String::from_utf8(bytes).ok()
    }

    /// Raw `StorageType` header.
    pub fn storage_type(&self) -> Option<&str> {
        self.header(STORAGE_TYPE_HEADER)
    }

    /// Parsed `Range` header; malformed ranges are ignored.
    pub fn range(&self) -> Option<ByteRange> {
        self.header("Range").and_then(ByteRange::parse)
    }
}

/// A single `bytes=start-end` range. `end` is inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: Option<u64>,
}

impl ByteRange {
    /// Parses `bytes=start-` or `bytes=start-end`. Suffix ranges
    /// (`bytes=-N`) and multi-range lists are not supported.
    pub fn parse(value: &str) -> Option<Self> {
        let ranges = value.trim().strip_prefix("bytes=")?;
        let (start, end) = ranges.split_once('-')?;
        let start = start.trim().parse().ok()?;
        let end = match end.trim() {
            "" => None,
            e => Some(e.parse().ok()?),
        };
        Some(Self { start, end })
    }

    /// Clamps the range to a body of `len` bytes and returns the inclusive
    /// `(start, end)` pair, or `None` if it selects nothing.
    pub fn resolve(&self, len: u64) -> Option<(u64, u64)> {
        if len == 0 || self.start >= len {
            return None;
        }
        let end = self.end.unwrap_or(len - 1).min(len - 1);
        if end < self.start {
            return None;
        }
        Some((self.start, end))
    }
}
