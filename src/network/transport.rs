//! Transport seam between the request tracker and the HTTP client

use std::fmt;

use super::request::{Operation, PageRequest, Payload};
use crate::browser::event::{DestroyAck, EventSender};

/// Opaque handle of one in-flight transport operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestHandle(u64);

impl RequestHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Issues HTTP operations and reports their completion through the event queue.
///
/// Every submitted handle receives at least one `RequestFinished` event;
/// aborting produces an `OperationCanceled` reply through the same path.
#[cfg_attr(test, mockall::automock)]
pub trait Transport {
    /// Start an operation and return its handle
    fn submit(
        &mut self,
        operation: Operation,
        request: &PageRequest,
        body: Option<Payload>,
        events: &EventSender,
    ) -> RequestHandle;

    /// Cancel an operation, its canceled reply is delivered asynchronously
    fn abort(&mut self, handle: RequestHandle, events: &EventSender);

    /// Free the resources of a finished operation, then post `RequestDisposed`
    fn dispose(&mut self, handle: RequestHandle, events: &EventSender);

    /// Tear the transport down and acknowledge once done
    fn release(&mut self, ack: DestroyAck);
}
