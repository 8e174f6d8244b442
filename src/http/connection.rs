use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::config::{Config, TriggerMode};
use crate::dispatch::{Dispatchable, Interest};
use crate::http::handler::RequestHandler;
use crate::http::parser::{ParseError, ParseStatus, RequestParser};
use crate::http::response::Response;
use crate::http::writer::{ResponseWriter, WriteProgress};
use crate::metrics::ServerMetrics;
use crate::server::socket::Socket;

const READ_CHUNK: usize = 8 * 1024;

/// Per-connection settings taken from the configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub trigger: TriggerMode,
    pub max_request_bytes: usize,
    pub default_document: String,
}

impl ConnectionConfig {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            trigger: cfg.server.trigger,
            max_request_bytes: cfg.server.max_request_bytes,
            default_document: cfg.static_files.default_document.clone(),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Lifecycle of one client socket.
///
/// ```text
///   on_readable ──► read ──► parse ──(incomplete)──► Read
///                              │
///                         (complete / error)
///                              ▼
///                 handle ──► compose ──► Write
///   on_writable ──► send ──(would block)──► Write
///                     │
///                  (done) ── keep-alive ──► parse leftovers / Read
///                     └──── otherwise ────► Close
/// ```
pub struct Connection<S: Socket> {
    socket: S,
    peer: Option<SocketAddr>,
    buffer: Vec<u8>,
    parser: RequestParser,
    writer: Option<ResponseWriter>,
    keep_alive: bool,
    handler: Arc<RequestHandler>,
    metrics: Arc<ServerMetrics>,
    trigger: TriggerMode,
    max_request_bytes: usize,
    closed: bool,
}

impl<S: Socket> Connection<S> {
    pub fn new(
        socket: S,
        handler: Arc<RequestHandler>,
        metrics: Arc<ServerMetrics>,
        cfg: &ConnectionConfig,
    ) -> Self {
        let peer = socket.peer_addr().ok();
        metrics.increment_active_connections();

        Self {
            socket,
            peer,
            buffer: Vec::with_capacity(4096),
            parser: RequestParser::new(cfg.default_document.clone(), cfg.max_request_bytes),
            writer: None,
            keep_alive: false,
            handler,
            metrics,
            trigger: cfg.trigger,
            max_request_bytes: cfg.max_request_bytes,
            closed: false,
        }
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// True while a response is waiting to be sent.
    pub fn is_writing(&self) -> bool {
        self.writer.is_some()
    }

    /// Bytes received but not yet consumed by a request.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Reads, then parses and responds if a full request is buffered.
    pub fn on_readable(&mut self) -> Interest {
        if !self.read_once() {
            self.close();
            return Interest::Close;
        }
        self.finish(Self::process)
    }

    /// Continues the pending response.
    pub fn on_writable(&mut self) -> Interest {
        self.finish(Self::write)
    }

    fn finish(&mut self, step: fn(&mut Self) -> Interest) -> Interest {
        let next = step(self);
        if next == Interest::Close {
            self.close();
        }
        next
    }

    /// Releases the response body and gives back the connection slot.
    /// Safe to call more than once.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(mut writer) = self.writer.take() {
            writer.release();
        }
        self.buffer = Vec::new();
        self.metrics.decrement_active_connections();
        debug!(peer = ?self.peer, "Connection closed");
    }

    fn read_into_buffer(&mut self) -> bool {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if self.buffer.len() >= self.max_request_bytes {
                // Let the parser report the overflow.
                return true;
            }
            match self.socket.try_read(&mut chunk) {
                Ok(0) => {
                    debug!(peer = ?self.peer, "Peer closed connection");
                    return false;
                }
                Ok(n) => {
                    self.buffer.extend_from_slice(&chunk[..n]);
                    if self.trigger == TriggerMode::Level {
                        return true;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return true,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!(peer = ?self.peer, error = %e, "Read failed");
                    return false;
                }
            }
        }
    }

    fn respond(&mut self, response: Response) -> Interest {
        self.keep_alive = response.keep_alive;
        let writer = match ResponseWriter::new(response) {
            Ok(writer) => writer,
            Err(e) => {
                error!(peer = ?self.peer, error = %e, "Response header overflow");
                self.keep_alive = false;
                match ResponseWriter::new(Response::internal_error()) {
                    Ok(writer) => writer,
                    Err(_) => return Interest::Close,
                }
            }
        };
        self.writer = Some(writer);
        Interest::Write
    }

    fn reject(&mut self, e: ParseError) -> Interest {
        warn!(peer = ?self.peer, error = %e, "Rejecting malformed request");
        self.parser.reset();
        self.buffer.clear();
        self.respond(Response::bad_request())
    }
}

impl<S: Socket> Dispatchable for Connection<S> {
    fn read_once(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.read_into_buffer()
    }

    fn process(&mut self) -> Interest {
        if self.closed {
            return Interest::Close;
        }
        if self.writer.is_some() {
            return Interest::Write;
        }

        match self.parser.advance(&self.buffer) {
            Ok(ParseStatus::Incomplete) if self.buffer.len() >= self.max_request_bytes => {
                self.reject(ParseError::TooLarge)
            }
            Ok(ParseStatus::Incomplete) => Interest::Read,
            Ok(ParseStatus::Complete { request, consumed }) => {
                self.buffer.drain(..consumed);
                let response = self.handler.handle(&request, self.peer);
                self.respond(response)
            }
            Err(e) => self.reject(e),
        }
    }

    fn write(&mut self) -> Interest {
        if self.closed {
            return Interest::Close;
        }
        let Some(writer) = self.writer.as_mut() else {
            return Interest::Read;
        };

        match writer.write_to(&self.socket) {
            Ok(WriteProgress::WouldBlock) => Interest::Write,
            Ok(WriteProgress::Done) => {
                self.writer = None;
                if !self.keep_alive {
                    return Interest::Close;
                }
                if self.buffer.is_empty() {
                    Interest::Read
                } else {
                    self.process()
                }
            }
            Err(e) => {
                debug!(peer = ?self.peer, error = %e, "Write failed");
                self.writer = None;
                Interest::Close
            }
        }
    }
}

impl<S: Socket> Drop for Connection<S> {
    fn drop(&mut self) {
        self.close();
    }
}
