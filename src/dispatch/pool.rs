use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info};

use crate::dispatch::queue::{SubmitError, TaskQueue};
use crate::dispatch::{execute, Direction, DispatchMode, Dispatchable, Interest};
use crate::error::{Error, Result};

type Completion<C> = Box<dyn FnOnce(C, Interest) + Send>;

/// A ready connection plus what woke it.
pub struct PendingTask<C> {
    conn: C,
    direction: Direction,
    done: Completion<C>,
}

impl<C: Dispatchable> PendingTask<C> {
    /// `done` receives the connection back with its next interest.
    pub fn new(
        conn: C,
        direction: Direction,
        done: impl FnOnce(C, Interest) + Send + 'static,
    ) -> Self {
        Self {
            conn,
            direction,
            done: Box::new(done),
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Gives up the connection without running it.
    pub fn into_connection(self) -> C {
        self.conn
    }

    pub fn run(self, mode: DispatchMode) {
        let PendingTask {
            mut conn,
            direction,
            done,
        } = self;
        let next = execute(&mut conn, direction, mode);
        done(conn, next);
    }
}

impl<C> fmt::Debug for PendingTask<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingTask")
            .field("direction", &self.direction)
            .finish_non_exhaustive()
    }
}

/// Fixed pool of worker threads pulling from one bounded queue.
pub struct Dispatcher<C: Dispatchable> {
    queue: Arc<TaskQueue<PendingTask<C>>>,
    workers: Vec<JoinHandle<()>>,
    mode: DispatchMode,
}

impl<C: Dispatchable> Dispatcher<C> {
    pub fn new(workers: usize, capacity: usize, mode: DispatchMode) -> Result<Self> {
        if workers == 0 {
            return Err(Error::InvalidConfig("dispatch.workers must be at least 1".into()));
        }
        if capacity == 0 {
            return Err(Error::InvalidConfig(
                "dispatch.max_requests must be at least 1".into(),
            ));
        }

        let queue = Arc::new(TaskQueue::new(capacity));
        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let queue = Arc::clone(&queue);
            let handle = thread::Builder::new()
                .name(format!("tierserve-worker-{id}"))
                .spawn(move || worker_loop(id, &queue, mode))?;
            handles.push(handle);
        }

        info!(workers, capacity, mode = ?mode, "Dispatcher started");
        Ok(Self {
            queue,
            workers: handles,
            mode,
        })
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Enqueues without blocking. A full queue hands the task back.
    pub fn submit(&self, task: PendingTask<C>) -> std::result::Result<(), SubmitError<PendingTask<C>>> {
        self.queue.push(task)
    }

    /// Stops accepting work, lets workers drain the queue and joins them.
    pub fn shutdown(&mut self) {
        self.queue.shutdown();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("Worker thread exited abnormally");
            }
        }
    }
}

impl<C: Dispatchable> Drop for Dispatcher<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop<C: Dispatchable>(id: usize, queue: &TaskQueue<PendingTask<C>>, mode: DispatchMode) {
    debug!(worker = id, "Worker started");
    while let Some(task) = queue.pop() {
        // A panic drops the connection, which closes it; the worker lives on.
        if panic::catch_unwind(AssertUnwindSafe(|| task.run(mode))).is_err() {
            error!(worker = id, "Task panicked, connection dropped");
        }
    }
    debug!(worker = id, "Worker stopped");
}
