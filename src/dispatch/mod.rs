//! Worker dispatch
//!
//! The readiness layer hands a ready connection to the [`Dispatcher`] as a
//! [`PendingTask`]. The task owns the connection until a worker has run it
//! to its next suspension point; the worker then passes the connection and
//! the next [`Interest`] to the task's completion callback. Ownership moves,
//! it is never shared, so at most one worker touches a connection at a time.
//!
//! ```text
//!  readiness ──submit──► TaskQueue ──pop──► worker ──run──► done(conn, interest)
//!      ▲                  (bounded)                              │
//!      └──────────────────── re-arm Read / Write, or Close ◄─────┘
//! ```

pub mod pool;
pub mod queue;

use serde::Deserialize;

pub use pool::{Dispatcher, PendingTask};
pub use queue::{SubmitError, TaskQueue};

/// Which readiness event produced a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Readable,
    Writable,
}

/// What a connection waits for after a worker is done with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    Read,
    Write,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Workers perform the non-blocking read or write themselves.
    #[default]
    Reactor,
    /// Workers only run the parse/route/respond pipeline; the readiness
    /// layer has already read the bytes.
    SingleStage,
}

/// A connection a worker can drive.
pub trait Dispatchable: Send + 'static {
    /// Reads what the socket has. Returns false when the peer is gone.
    fn read_once(&mut self) -> bool;

    /// Runs parse, route and respond over the buffered bytes.
    fn process(&mut self) -> Interest;

    /// Continues sending the pending response.
    fn write(&mut self) -> Interest;
}

/// One worker step for `conn`.
pub fn execute<C: Dispatchable>(conn: &mut C, direction: Direction, mode: DispatchMode) -> Interest {
    match (mode, direction) {
        (DispatchMode::Reactor, Direction::Readable) => {
            if conn.read_once() {
                conn.process()
            } else {
                Interest::Close
            }
        }
        (DispatchMode::Reactor, Direction::Writable) => conn.write(),
        (DispatchMode::SingleStage, _) => conn.process(),
    }
}
