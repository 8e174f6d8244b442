//! Incremental HTTP/1.1 request parser
//!
//! [`RequestParser`] is fed the connection's whole read buffer after every
//! read and picks up where it stopped last time, so a request may arrive in
//! any number of pieces:
//!
//! ```text
//!   RequestLine ──► Headers ──(blank line, no body)──► Complete
//!                      │
//!                      └─(blank line, Content-Length > 0)──► Body ──► Complete
//! ```
//!
//! Any violation ends in a [`ParseError`]. On `Complete` the parser resets
//! itself and reports how many buffer bytes the request used; the caller
//! drains those before feeding the next request.

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use crate::http::request::{Method, Request};
use crate::http::scanner::{LineStatus, scan_line};

/// Served in place of a bare `/` when no other document is configured.
pub const DEFAULT_DOCUMENT: &str = "judge.html";
/// Upper bound on the request line plus headers.
pub const MAX_HEADER_BYTES: usize = 64 * 1024;
/// Default upper bound on a whole request, body included.
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("malformed request line")]
    InvalidRequest,
    #[error("unsupported method")]
    InvalidMethod,
    #[error("invalid request target")]
    InvalidTarget,
    #[error("unsupported HTTP version")]
    UnsupportedVersion,
    #[error("malformed line terminator")]
    MalformedLine,
    #[error("invalid Content-Length")]
    InvalidContentLength,
    #[error("request exceeds size limit")]
    TooLarge,
    /// Only returned by [`parse_http_request`]; the incremental parser
    /// reports this as [`ParseStatus::Incomplete`].
    #[error("incomplete request")]
    Incomplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    RequestLine,
    Headers,
    Body,
}

#[derive(Debug)]
pub enum ParseStatus {
    /// More bytes are needed.
    Incomplete,
    /// A full request; it occupied `buf[..consumed]`.
    Complete { request: Request, consumed: usize },
}

pub struct RequestParser {
    state: ParseState,
    /// Where the next line scan resumes.
    checked: usize,
    /// Start of the line currently being assembled.
    line_start: usize,
    body_start: usize,
    method: Method,
    path: String,
    version: String,
    headers: HashMap<String, String>,
    content_length: usize,
    default_document: String,
    max_request_bytes: usize,
}

impl RequestParser {
    pub fn new(default_document: impl Into<String>, max_request_bytes: usize) -> Self {
        Self {
            state: ParseState::RequestLine,
            checked: 0,
            line_start: 0,
            body_start: 0,
            method: Method::GET,
            path: String::new(),
            version: String::new(),
            headers: HashMap::new(),
            content_length: 0,
            default_document: default_document.into(),
            max_request_bytes,
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    /// Forgets the request in progress.
    pub fn reset(&mut self) {
        self.state = ParseState::RequestLine;
        self.checked = 0;
        self.line_start = 0;
        self.body_start = 0;
        self.method = Method::GET;
        self.path.clear();
        self.version.clear();
        self.headers = HashMap::new();
        self.content_length = 0;
    }

    /// Continues parsing `buf`, which must start at the first byte of the
    /// current request and only ever grow between calls.
    pub fn advance(&mut self, buf: &[u8]) -> Result<ParseStatus, ParseError> {
        loop {
            if self.state == ParseState::Body {
                return Ok(self.try_finish_body(buf));
            }

            let (end, next) = match scan_line(buf, self.checked) {
                LineStatus::Complete { end, next } => (end, next),
                LineStatus::Incomplete { resume } => {
                    self.checked = resume;
                    if buf.len() > MAX_HEADER_BYTES {
                        return Err(ParseError::TooLarge);
                    }
                    return Ok(ParseStatus::Incomplete);
                }
                LineStatus::Malformed { .. } => return Err(ParseError::MalformedLine),
            };

            if next > MAX_HEADER_BYTES {
                return Err(ParseError::TooLarge);
            }

            let line = &buf[self.line_start..end];
            self.checked = next;
            self.line_start = next;

            if self.state == ParseState::RequestLine {
                self.parse_request_line(line)?;
                self.state = ParseState::Headers;
            } else if line.is_empty() {
                if self.content_length == 0 {
                    return Ok(self.complete(Vec::new(), next));
                }
                if next.saturating_add(self.content_length) > self.max_request_bytes {
                    return Err(ParseError::TooLarge);
                }
                self.body_start = next;
                self.state = ParseState::Body;
            } else {
                self.parse_header(line)?;
            }
        }
    }

    fn try_finish_body(&mut self, buf: &[u8]) -> ParseStatus {
        let available = buf.len().saturating_sub(self.body_start);
        if available < self.content_length {
            return ParseStatus::Incomplete;
        }
        let end = self.body_start + self.content_length;
        let body = buf[self.body_start..end].to_vec();
        self.complete(body, end)
    }

    fn complete(&mut self, body: Vec<u8>, consumed: usize) -> ParseStatus {
        let request = Request {
            method: self.method,
            path: std::mem::take(&mut self.path),
            version: std::mem::take(&mut self.version),
            headers: std::mem::take(&mut self.headers),
            body,
        };
        self.reset();
        ParseStatus::Complete { request, consumed }
    }

    fn parse_request_line(&mut self, line: &[u8]) -> Result<(), ParseError> {
        let text = std::str::from_utf8(line).map_err(|_| ParseError::InvalidRequest)?;

        let (method, rest) = split_token(text).ok_or(ParseError::InvalidRequest)?;
        let (target, version) = split_token(rest).ok_or(ParseError::InvalidRequest)?;

        self.method = Method::from_str(method).ok_or(ParseError::InvalidMethod)?;

        let version = version.trim_end_matches([' ', '\t']);
        if !version.eq_ignore_ascii_case("HTTP/1.1") {
            return Err(ParseError::UnsupportedVersion);
        }
        self.version = "HTTP/1.1".to_string();
        self.path = normalize_target(target, &self.default_document)?;

        debug!(method = self.method.as_str(), path = %self.path, "Request line parsed");
        Ok(())
    }

    fn parse_header(&mut self, line: &[u8]) -> Result<(), ParseError> {
        let Some((key, value)) = std::str::from_utf8(line)
            .ok()
            .and_then(|text| text.split_once(':'))
        else {
            debug!(line = %String::from_utf8_lossy(line), "Ignoring unknown header format");
            return Ok(());
        };

        let key = key.trim_matches([' ', '\t']);
        let value = value.trim_matches([' ', '\t']);
        if key.is_empty() {
            return Ok(());
        }

        if key.eq_ignore_ascii_case("Content-Length") {
            self.content_length = value
                .parse()
                .map_err(|_| ParseError::InvalidContentLength)?;
        }

        self.headers.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Splits off the first token and skips the run of spaces/tabs after it.
fn split_token(text: &str) -> Option<(&str, &str)> {
    let idx = text.find([' ', '\t'])?;
    let (token, rest) = text.split_at(idx);
    Some((token, rest.trim_start_matches([' ', '\t'])))
}

/// Reduces a request target to a routable path.
///
/// Absolute-form targets lose their scheme and host, the query string is
/// dropped and `/` becomes the default document.
pub fn normalize_target(target: &str, default_document: &str) -> Result<String, ParseError> {
    let mut path = target;

    for scheme in ["http://", "https://"] {
        let has_scheme = path
            .get(..scheme.len())
            .is_some_and(|p| p.eq_ignore_ascii_case(scheme));
        if has_scheme {
            let authority_and_path = &path[scheme.len()..];
            let slash = authority_and_path.find('/').ok_or(ParseError::InvalidTarget)?;
            path = &authority_and_path[slash..];
        }
    }

    if !path.starts_with('/') {
        return Err(ParseError::InvalidTarget);
    }

    let path = path.split('?').next().unwrap_or(path);
    if path == "/" {
        return Ok(format!("/{}", default_document.trim_start_matches('/')));
    }
    Ok(path.to_string())
}

/// Parses one complete request from `buf` with default limits.
///
/// Returns [`ParseError::Incomplete`] when `buf` ends before the request
/// does.
pub fn parse_http_request(buf: &[u8]) -> Result<(Request, usize), ParseError> {
    let mut parser = RequestParser::new(DEFAULT_DOCUMENT, DEFAULT_MAX_REQUEST_BYTES);
    match parser.advance(buf)? {
        ParseStatus::Complete { request, consumed } => Ok((request, consumed)),
        ParseStatus::Incomplete => Err(ParseError::Incomplete),
    }
}
