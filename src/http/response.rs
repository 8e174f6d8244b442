use bytes::Bytes;

use crate::storage::mapped::MappedFile;

/// HTTP status codes produced by the server.
///
/// - `Ok` (200): Request successful
/// - `PartialContent` (206): Range request served
/// - `Found` (302): Redirect after login
/// - `BadRequest` (400): Malformed request, or a directory requested as a file
/// - `Forbidden` (403): File not readable by others
/// - `NotFound` (404): Resource not found
/// - `InternalServerError` (500): Storage or codec failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 206 Partial Content
    PartialContent,
    /// 302 Found
    Found,
    /// 400 Bad Request
    BadRequest,
    /// 403 Forbidden
    Forbidden,
    /// 404 Not Found
    NotFound,
    /// 500 Internal Server Error
    InternalServerError,
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use tierserve::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::PartialContent.as_u16(), 206);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::PartialContent => 206,
            StatusCode::Found => 302,
            StatusCode::BadRequest => 400,
            StatusCode::Forbidden => 403,
            StatusCode::NotFound => 404,
            StatusCode::InternalServerError => 500,
        }
    }

    /// Returns the standard HTTP reason phrase for this status code.
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::PartialContent => "Partial Content",
            StatusCode::Found => "Found",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::Forbidden => "Forbidden",
            StatusCode::NotFound => "Not Found",
            StatusCode::InternalServerError => "Internal Server Error",
        }
    }

    /// Human-readable body sent with error statuses.
    pub fn error_form(&self) -> &'static str {
        match self {
            StatusCode::BadRequest => {
                "Your request has bad syntax or is inherently impossible to satisfy.\n"
            }
            StatusCode::Forbidden => "You do not have permission to get file from this server.\n",
            StatusCode::NotFound => "The requested file was not found on this server.\n",
            StatusCode::InternalServerError => {
                "There was an unusual problem serving the request file.\n"
            }
            _ => "",
        }
    }
}

/// Sent for zero-length resources.
pub const EMPTY_HTML: &str = "<html><body></body></html>";

/// Response body, sent as the second segment of a vectored write.
#[derive(Debug, Clone, Default)]
pub enum Body {
    #[default]
    Empty,
    /// In-memory body (JSON, HTML fallback, error forms).
    Bytes(Bytes),
    /// `len` bytes of a mapped file starting at `offset`.
    File {
        file: MappedFile,
        offset: usize,
        len: usize,
    },
}

impl Body {
    pub fn len(&self) -> usize {
        match self {
            Body::Empty => 0,
            Body::Bytes(b) => b.len(),
            Body::File { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        match self {
            Body::Empty => &[][..],
            Body::Bytes(b) => b.as_ref(),
            Body::File { file, offset, len } => &file.as_bytes()[*offset..*offset + *len],
        }
    }
}

/// Represents a complete HTTP response ready to be sent to a client.
///
/// `Content-Length` and `Connection` are not stored in `headers`; the
/// writer derives them from `body` and `keep_alive`.
#[derive(Debug)]
pub struct Response {
    /// The HTTP status code
    pub status: StatusCode,
    /// Extra headers, in emission order
    pub headers: Vec<(String, String)>,
    /// Response body
    pub body: Body,
    /// Whether the connection stays open afterwards
    pub keep_alive: bool,
}

/// Builder for constructing HTTP responses in a fluent style.
///
/// # Example
///
/// ```
/// # use tierserve::http::response::{ResponseBuilder, StatusCode};
/// let response = ResponseBuilder::new(StatusCode::Ok)
///     .header("Content-Type", "application/json")
///     .body(b"{}".to_vec())
///     .build();
/// assert_eq!(response.header("content-type"), Some("application/json"));
/// ```
pub struct ResponseBuilder {
    status: StatusCode,
    headers: Vec<(String, String)>,
    body: Body,
    keep_alive: bool,
}

impl ResponseBuilder {
    /// Creates a new response builder with the specified status code.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Body::Empty,
            keep_alive: false,
        }
    }

    /// Adds or replaces a header (names compared ignoring ASCII case).
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&key))
        {
            Some(slot) => slot.1 = value,
            None => self.headers.push((key, value)),
        }
        self
    }

    /// Sets an in-memory body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Body::Bytes(body.into());
        self
    }

    /// Serves `len` bytes of `file` starting at `offset`.
    pub fn file_body(mut self, file: MappedFile, offset: usize, len: usize) -> Self {
        self.body = Body::File { file, offset, len };
        self
    }

    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Builds the final Response.
    pub fn build(self) -> Response {
        Response {
            status: self.status,
            headers: self.headers,
            body: self.body,
            keep_alive: self.keep_alive,
        }
    }
}

impl Response {
    /// Creates a simple 200 OK response with the given body.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        ResponseBuilder::new(StatusCode::Ok).body(body).build()
    }

    /// Creates an error response carrying the status's standard form text.
    pub fn error(status: StatusCode) -> Self {
        ResponseBuilder::new(status)
            .header("Content-Type", "text/html")
            .body(status.error_form())
            .build()
    }

    /// Creates a 400 Bad Request response.
    pub fn bad_request() -> Self {
        Self::error(StatusCode::BadRequest)
    }

    /// Creates a 403 Forbidden response.
    pub fn forbidden() -> Self {
        Self::error(StatusCode::Forbidden)
    }

    /// Creates a 404 Not Found response.
    pub fn not_found() -> Self {
        Self::error(StatusCode::NotFound)
    }

    /// Creates a 500 Internal Server Error response.
    pub fn internal_error() -> Self {
        Self::error(StatusCode::InternalServerError)
    }

    /// 200 with a JSON body.
    pub fn json(body: impl Into<Bytes>) -> Self {
        ResponseBuilder::new(StatusCode::Ok)
            .header("Content-Type", "application/json")
            .body(body)
            .build()
    }

    /// 302 to `location`, no body.
    pub fn redirect(location: impl Into<String>) -> Self {
        ResponseBuilder::new(StatusCode::Found)
            .header("Location", location)
            .build()
    }

    /// 200 with the placeholder HTML used for zero-length files.
    pub fn empty_html() -> Self {
        ResponseBuilder::new(StatusCode::Ok)
            .header("Content-Type", "text/html")
            .body(EMPTY_HTML)
            .build()
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn with_keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }
}
