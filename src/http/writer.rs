//! Resumable response writer.
//!
//! The header block is composed into a bounded buffer; the body stays where
//! it is (an in-memory `Bytes` or a mapped file). Both go out in one
//! vectored write of at most two segments, and the writer remembers how far
//! each got so a `WouldBlock` never causes bytes to be sent twice.

use std::fmt::Write as _;
use std::io::{self, IoSlice};

use thiserror::Error;

use crate::http::response::{Body, Response, StatusCode};
use crate::server::socket::Socket;

const HTTP_VERSION: &str = "HTTP/1.1";
/// Capacity of the header block.
pub const WRITE_BUFFER_SIZE: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("response header exceeds {limit} bytes")]
pub struct HeaderOverflow {
    pub limit: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteProgress {
    /// Everything was written and the body released.
    Done,
    /// The socket is full; call again once it is writable.
    WouldBlock,
}

#[derive(Debug)]
pub struct ResponseWriter {
    header: String,
    body: Body,
    header_sent: usize,
    body_sent: usize,
    keep_alive: bool,
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self {
            header: String::with_capacity(256),
            body: Body::Empty,
            header_sent: 0,
            body_sent: 0,
            keep_alive: false,
        }
    }
}

impl ResponseWriter {
    /// Composes the header block for `response`.
    ///
    /// Order: status line, `Content-Length`, `Content-Type`, `Connection`,
    /// remaining headers, blank line.
    pub fn new(response: Response) -> Result<Self, HeaderOverflow> {
        let Response {
            status,
            headers,
            body,
            keep_alive,
        } = response;

        let mut writer = Self::default();
        writer.add_status_line(status)?;
        writer.add_content_length(body.len())?;
        if let Some((_, ct)) = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("Content-Type"))
        {
            writer.add_content_type(ct)?;
        }
        writer.add_linger(keep_alive)?;
        for (key, value) in &headers {
            if key.eq_ignore_ascii_case("Content-Type")
                || key.eq_ignore_ascii_case("Content-Length")
                || key.eq_ignore_ascii_case("Connection")
            {
                continue;
            }
            writer.add_header(key, value)?;
        }
        writer.add_blank_line()?;
        writer.body = body;
        Ok(writer)
    }

    /// Appends raw text to the header block, refusing to grow past
    /// [`WRITE_BUFFER_SIZE`].
    pub fn add_response(&mut self, text: &str) -> Result<(), HeaderOverflow> {
        if self.header.len() + text.len() > WRITE_BUFFER_SIZE {
            return Err(HeaderOverflow {
                limit: WRITE_BUFFER_SIZE,
            });
        }
        self.header.push_str(text);
        Ok(())
    }

    pub fn add_status_line(&mut self, status: StatusCode) -> Result<(), HeaderOverflow> {
        let mut line = String::with_capacity(32);
        let _ = write!(
            line,
            "{} {} {}\r\n",
            HTTP_VERSION,
            status.as_u16(),
            status.reason_phrase()
        );
        self.add_response(&line)
    }

    pub fn add_content_length(&mut self, len: usize) -> Result<(), HeaderOverflow> {
        self.add_header("Content-Length", &len.to_string())
    }

    pub fn add_content_type(&mut self, content_type: &str) -> Result<(), HeaderOverflow> {
        self.add_header("Content-Type", content_type)
    }

    /// `Connection` header.
    pub fn add_linger(&mut self, keep_alive: bool) -> Result<(), HeaderOverflow> {
        self.keep_alive = keep_alive;
        self.add_header(
            "Connection",
            if keep_alive { "keep-alive" } else { "close" },
        )
    }

    pub fn add_header(&mut self, key: &str, value: &str) -> Result<(), HeaderOverflow> {
        let mut line = String::with_capacity(key.len() + value.len() + 4);
        let _ = write!(line, "{key}: {value}\r\n");
        self.add_response(&line)
    }

    pub fn add_blank_line(&mut self) -> Result<(), HeaderOverflow> {
        self.add_response("\r\n")
    }

    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    pub fn header_bytes(&self) -> &[u8] {
        self.header.as_bytes()
    }

    pub fn total_len(&self) -> usize {
        self.header.len() + self.body.len()
    }

    pub fn bytes_sent(&self) -> usize {
        self.header_sent + self.body_sent
    }

    pub fn remaining(&self) -> usize {
        self.total_len() - self.bytes_sent()
    }

    pub fn is_finished(&self) -> bool {
        self.remaining() == 0
    }

    /// Writes as much as the socket accepts.
    ///
    /// On `Done` or on a hard error the body is released. A zero-byte write
    /// is reported as `WriteZero`.
    pub fn write_to<S: Socket>(&mut self, socket: &S) -> io::Result<WriteProgress> {
        loop {
            if self.is_finished() {
                self.release();
                return Ok(WriteProgress::Done);
            }

            let head = &self.header.as_bytes()[self.header_sent..];
            let body = &self.body.as_slice()[self.body_sent..];
            let segments = [IoSlice::new(head), IoSlice::new(body)];
            let segments = if head.is_empty() {
                &segments[1..]
            } else if body.is_empty() {
                &segments[..1]
            } else {
                &segments[..]
            };

            match socket.try_write_vectored(segments) {
                Ok(0) => {
                    self.release();
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "connection closed while writing",
                    ));
                }
                Ok(n) => self.advance(n),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(WriteProgress::WouldBlock);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.release();
                    return Err(e);
                }
            }
        }
    }

    fn advance(&mut self, n: usize) {
        let from_header = n.min(self.header.len() - self.header_sent);
        self.header_sent += from_header;
        let from_body = (n - from_header).min(self.body.len() - self.body_sent);
        self.body_sent += from_body;
    }

    /// Drops the body, unmapping any file it points into, and marks the
    /// writer finished. Idempotent.
    pub fn release(&mut self) {
        self.body = Body::Empty;
        self.body_sent = 0;
        self.header_sent = self.header.len();
    }

    /// Header block and body concatenated.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.total_len());
        out.extend_from_slice(self.header.as_bytes());
        out.extend_from_slice(self.body.as_slice());
        out
    }
}
