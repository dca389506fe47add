//! Network stack for crawlview
//!
//! The transport issues HTTP operations over a pooled client, the request
//! tracker sits in front of it and re-issues transient failures.

mod client;
mod reply;
mod request;
mod tracker;
mod transport;

pub use client::HttpTransport;
pub use reply::Reply;
pub use request::{Operation, PageRequest, Payload, form_body};
pub use tracker::{Completion, DEFAULT_MAX_RETRIES, RequestTracker, TrackedRequest};
pub use transport::{RequestHandle, Transport};

#[cfg(test)]
pub use transport::MockTransport;

use crate::browser::{EventSender, LoadStatus};

/// The rendering engine's view of the network while it loads a page
pub struct NetworkAccess<'a> {
    tracker: &'a mut RequestTracker,
    transport: &'a mut dyn Transport,
    events: &'a EventSender,
}

impl<'a> NetworkAccess<'a> {
    pub fn new(
        tracker: &'a mut RequestTracker,
        transport: &'a mut dyn Transport,
        events: &'a EventSender,
    ) -> Self {
        Self {
            tracker,
            transport,
            events,
        }
    }

    /// Issue a tracked request on behalf of the page
    pub fn request(
        &mut self,
        operation: Operation,
        request: PageRequest,
        body: Option<Payload>,
    ) -> RequestHandle {
        self.tracker
            .begin(self.transport, operation, request, body, self.events)
    }

    /// Emit the page's render-complete event for the task being loaded
    pub fn render_complete(&self, status: LoadStatus) {
        self.events
            .render_complete(self.tracker.current_task(), status);
    }

    pub fn active_requests(&self) -> usize {
        self.tracker.active_count()
    }
}
