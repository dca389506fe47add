//! One page-load task and its result

use std::fmt;
use std::time::Instant;

use serde::Serialize;

use crate::network::{Operation, PageRequest};

/// Task identifier, unique per browser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Task lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    Running,
    TimedOut,
    Finished,
}

/// Outcome carried by a render-complete event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// The engine finished loading
    Loaded,
    /// The engine gave up on the page
    Failed,
    /// Synthetic, raised by the task deadline
    TimedOut,
    /// Synthetic, raised by shutdown
    Aborted,
}

impl LoadStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, LoadStatus::Loaded)
    }

    /// Raised by the browser itself rather than the engine
    pub fn is_synthetic(&self) -> bool {
        matches!(self, LoadStatus::TimedOut | LoadStatus::Aborted)
    }
}

/// Result handed to the driver once per task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskResult {
    /// Final URL after redirects, empty if navigation never resolved
    pub url: String,
    /// Rendered document text
    pub html: String,
    pub successful: bool,
    /// Error descriptions in the order they were recorded
    pub errors: Vec<String>,
}

impl TaskResult {
    /// Result for a task that could not even start
    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            url: String::new(),
            html: String::new(),
            successful: false,
            errors: vec![error.into()],
        }
    }
}

/// A running page-load operation
#[derive(Debug)]
pub struct Task {
    id: TaskId,
    operation: Operation,
    request: PageRequest,
    state: TaskState,
    errors: Vec<String>,
    started_at: Instant,
}

impl Task {
    pub fn new(id: TaskId, operation: Operation, request: PageRequest) -> Self {
        Self {
            id,
            operation,
            request,
            state: TaskState::Running,
            errors: Vec::new(),
            started_at: Instant::now(),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn request(&self) -> &PageRequest {
        &self.request
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn record_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// The deadline expired before the task finished
    pub fn mark_timed_out(&mut self) {
        if self.state == TaskState::Running {
            self.state = TaskState::TimedOut;
        }
    }

    pub fn is_timed_out(&self) -> bool {
        self.state == TaskState::TimedOut
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    /// Consume the task into its result
    pub fn finish(mut self, url: String, html: String, ok: bool) -> TaskResult {
        let successful = ok && !self.is_timed_out();
        self.state = TaskState::Finished;
        TaskResult {
            url,
            html,
            successful,
            errors: self.errors,
        }
    }
}
