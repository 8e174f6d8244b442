//! HTTP protocol implementation.
//!
//! This module implements the HTTP/1.1 subset the server speaks: GET and
//! POST, `Content-Length` bodies and keep-alive. No chunked encoding.
//!
//! # Architecture
//!
//! - **`scanner`**: finds CRLF line ends in a growing buffer
//! - **`parser`**: incremental request parser, resumable across reads
//! - **`request`**: request representation and header accessors
//! - **`response`**: status codes, response bodies and the response builder
//! - **`handler`**: routes a request to monitor, storage, auth or file serving
//! - **`writer`**: header composition and resumable vectored writes
//! - **`mime`**: MIME type detection based on file extensions
//! - **`connection`**: the per-socket state machine driven by the dispatcher
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← bytes appended, parser resumes where it stopped
//!        └──────┬──────┘
//!               │ Request complete (or malformed → 400)
//!               ▼
//!        ┌──────────────────┐
//!        │   Processing     │ ← route, compose header block + body
//!        └──────┬───────────┘
//!               │ Response ready
//!               ▼
//!        ┌──────────────────┐
//!        │    Writing       │ ← vectored writes until done or would-block
//!        └──────┬───────────┘
//!               │ Response sent
//!               ├─ Keep-Alive → Reading (buffered leftovers parsed first)
//!               └─ Close → Closed
//! ```
//!
//! Each transition ends at a suspension point where the connection reports
//! the next [`crate::dispatch::Interest`] and is handed back to the
//! readiness layer.

pub mod connection;
pub mod handler;
pub mod mime;
pub mod parser;
pub mod request;
pub mod response;
pub mod scanner;
pub mod writer;
