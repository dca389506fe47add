//! Events processed by the browser's single event loop

use std::fmt;
use std::time::Duration;

use log::debug;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::shutdown::{Component, ShutdownCallback};
use super::task::{LoadStatus, TaskId};
use crate::network::{Operation, PageRequest, Payload, Reply, RequestHandle};

/// Everything that can happen to a browser, in arrival order
pub enum BrowserEvent {
    /// Terminal event of one transport operation
    RequestFinished { handle: RequestHandle, reply: Reply },
    /// The transport released a finished operation
    RequestDisposed(RequestHandle),
    /// Page loading finished, for the named task. Emissions without a task
    /// apply to whichever task is running.
    RenderComplete {
        task: Option<TaskId>,
        status: LoadStatus,
    },
    /// Task deadline expired
    TimeoutFired(TaskId),
    /// Re-check for drained requests after a deferred render-complete
    DrainCheck { task: TaskId, status: LoadStatus },
    /// One owned component confirmed its destruction
    Destroyed(Component),
    /// Start a task, posted through a `BrowserHandle`
    Perform {
        operation: Operation,
        request: PageRequest,
        body: Option<Payload>,
    },
    /// Request shutdown, posted through a `BrowserHandle`
    Shutdown(ShutdownCallback),
}

impl fmt::Debug for BrowserEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestFinished { handle, reply } => f
                .debug_struct("RequestFinished")
                .field("handle", handle)
                .field("status", &reply.status())
                .field("error", &reply.error())
                .finish(),
            Self::RequestDisposed(handle) => f.debug_tuple("RequestDisposed").field(handle).finish(),
            Self::RenderComplete { task, status } => f
                .debug_struct("RenderComplete")
                .field("task", task)
                .field("status", status)
                .finish(),
            Self::TimeoutFired(task) => f.debug_tuple("TimeoutFired").field(task).finish(),
            Self::DrainCheck { task, status } => f
                .debug_struct("DrainCheck")
                .field("task", task)
                .field("status", status)
                .finish(),
            Self::Destroyed(component) => f.debug_tuple("Destroyed").field(component).finish(),
            Self::Perform {
                operation, request, ..
            } => f
                .debug_struct("Perform")
                .field("operation", operation)
                .field("url", &request.url().as_str())
                .finish(),
            Self::Shutdown(_) => f.write_str("Shutdown"),
        }
    }
}

/// Cloneable sender side of the browser event queue
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<BrowserEvent>,
}

impl EventSender {
    /// Queue an event, dropped silently once the loop is gone
    pub fn send(&self, event: BrowserEvent) {
        if let Err(err) = self.tx.send(event) {
            debug!("Event loop closed, dropping {:?}.", err.0);
        }
    }

    /// Queue an event after `delay`. Aborting the returned handle cancels it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn send_after(&self, delay: Duration, event: BrowserEvent) -> JoinHandle<()> {
        let events = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            events.send(event);
        })
    }

    pub fn request_finished(&self, handle: RequestHandle, reply: Reply) {
        self.send(BrowserEvent::RequestFinished { handle, reply });
    }

    pub fn request_disposed(&self, handle: RequestHandle) {
        self.send(BrowserEvent::RequestDisposed(handle));
    }

    /// Render-complete as emitted by the rendering engine
    pub fn render_complete(&self, task: Option<TaskId>, status: LoadStatus) {
        self.send(BrowserEvent::RenderComplete { task, status });
    }
}

/// Create a new event queue
pub fn channel() -> (EventSender, mpsc::UnboundedReceiver<BrowserEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, rx)
}

/// One-time acknowledgement that a component has been destroyed.
///
/// Dropping an unacknowledged value acknowledges it.
#[derive(Debug)]
pub struct DestroyAck {
    component: Component,
    events: Option<EventSender>,
}

impl DestroyAck {
    pub(crate) fn new(component: Component, events: EventSender) -> Self {
        Self {
            component,
            events: Some(events),
        }
    }

    pub fn component(&self) -> Component {
        self.component
    }

    pub fn acknowledge(mut self) {
        self.fire();
    }

    fn fire(&mut self) {
        if let Some(events) = self.events.take() {
            events.send(BrowserEvent::Destroyed(self.component));
        }
    }
}

impl Drop for DestroyAck {
    fn drop(&mut self) {
        self.fire();
    }
}
