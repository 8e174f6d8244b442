//! Bounded FIFO shared by the readiness layer and the worker threads.

use std::collections::VecDeque;
use std::fmt;

use parking_lot::{Condvar, Mutex};

/// Why a task was not accepted. The task is handed back either way.
pub enum SubmitError<T> {
    /// The queue is at capacity; treat as backpressure.
    Full(T),
    /// The pool is shutting down.
    ShutDown(T),
}

impl<T> SubmitError<T> {
    pub fn into_inner(self) -> T {
        match self {
            SubmitError::Full(t) | SubmitError::ShutDown(t) => t,
        }
    }
}

impl<T> fmt::Debug for SubmitError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::Full(_) => f.write_str("Full(..)"),
            SubmitError::ShutDown(_) => f.write_str("ShutDown(..)"),
        }
    }
}

impl<T> fmt::Display for SubmitError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::Full(_) => f.write_str("dispatch queue is full"),
            SubmitError::ShutDown(_) => f.write_str("dispatcher is shut down"),
        }
    }
}

impl<T> std::error::Error for SubmitError<T> {}

struct State<T> {
    tasks: VecDeque<T>,
    shutdown: bool,
}

pub struct TaskQueue<T> {
    state: Mutex<State<T>>,
    available: Condvar,
    capacity: usize,
}

impl<T> TaskQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(State {
                tasks: VecDeque::with_capacity(capacity.min(1024)),
                shutdown: false,
            }),
            available: Condvar::new(),
            capacity,
        }
    }

    /// Appends `task` without blocking.
    pub fn push(&self, task: T) -> Result<(), SubmitError<T>> {
        let mut state = self.state.lock();
        if state.shutdown {
            return Err(SubmitError::ShutDown(task));
        }
        if state.tasks.len() >= self.capacity {
            return Err(SubmitError::Full(task));
        }
        state.tasks.push_back(task);
        drop(state);

        self.available.notify_one();
        Ok(())
    }

    /// Blocks until a task is available. Returns `None` once the queue is
    /// shut down and drained.
    pub fn pop(&self) -> Option<T> {
        let mut state = self.state.lock();
        loop {
            if let Some(task) = state.tasks.pop_front() {
                return Some(task);
            }
            if state.shutdown {
                return None;
            }
            self.available.wait(&mut state);
        }
    }

    pub fn try_pop(&self) -> Option<T> {
        self.state.lock().tasks.pop_front()
    }

    /// Rejects further pushes and wakes every waiting worker.
    pub fn shutdown(&self) {
        self.state.lock().shutdown = true;
        self.available.notify_all();
    }

    pub fn is_shut_down(&self) -> bool {
        self.state.lock().shutdown
    }

    pub fn len(&self) -> usize {
        self.state.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
