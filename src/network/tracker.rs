//! Request tracker
//!
//! Keeps one entry per transport operation issued for the current page load,
//! together with the retry count and a snapshot of the outgoing body. The
//! snapshot lets a transient failure be re-issued with the exact bytes of the
//! first attempt.

use std::collections::HashMap;

use log::{debug, info};

use super::reply::Reply;
use super::request::{Operation, PageRequest, Payload};
use super::transport::{RequestHandle, Transport};
use crate::browser::TaskId;
use crate::browser::event::EventSender;

/// Default number of times a transient failure is re-issued
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// One transport operation, either an original request or a retry of one
#[derive(Debug, Clone)]
pub struct TrackedRequest {
    handle: RequestHandle,
    origin: RequestHandle,
    operation: Operation,
    request: PageRequest,
    payload: Option<Payload>,
    retry_count: u32,
    finished: bool,
    task: Option<TaskId>,
}

impl TrackedRequest {
    pub fn handle(&self) -> RequestHandle {
        self.handle
    }

    /// Handle of the first attempt, shared by every retry
    pub fn origin(&self) -> RequestHandle {
        self.origin
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn request(&self) -> &PageRequest {
        &self.request
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Task that was running when the first attempt was issued
    pub fn task(&self) -> Option<TaskId> {
        self.task
    }
}

/// What a terminal transport event meant for the logical request
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// Re-issued under a new handle, the logical request is still active
    Retried {
        origin: RequestHandle,
        handle: RequestHandle,
        retry_count: u32,
    },
    /// Completed without error
    Succeeded { origin: RequestHandle, reply: Reply },
    /// Completed with an error that is not retried
    Failed {
        origin: RequestHandle,
        error: String,
        reply: Reply,
    },
    /// Unknown handle, or a second terminal event for a finished request
    Ignored,
}

/// Tracks in-flight requests and re-issues transient failures
#[derive(Debug)]
pub struct RequestTracker {
    requests: HashMap<RequestHandle, TrackedRequest>,
    max_retries: u32,
    retries_enabled: bool,
    task: Option<TaskId>,
}

impl RequestTracker {
    pub fn new(max_retries: u32) -> Self {
        Self {
            requests: HashMap::new(),
            max_retries,
            retries_enabled: true,
            task: None,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Register and submit a new request. The payload is only kept for
    /// operations that carry a body.
    pub fn begin(
        &mut self,
        transport: &mut dyn Transport,
        operation: Operation,
        request: PageRequest,
        payload: Option<Payload>,
        events: &EventSender,
    ) -> RequestHandle {
        let payload = payload.filter(|_| operation.carries_body());
        let handle = transport.submit(operation, &request, payload.clone(), events);
        info!("Request {} started.", handle);

        self.requests.insert(
            handle,
            TrackedRequest {
                handle,
                origin: handle,
                operation,
                request,
                payload,
                retry_count: 0,
                finished: false,
                task: self.task,
            },
        );
        handle
    }

    /// Handle the terminal event of one transport operation.
    ///
    /// The operation is marked finished and its resources are scheduled for
    /// disposal in every case except `Ignored`.
    pub fn on_completed(
        &mut self,
        transport: &mut dyn Transport,
        handle: RequestHandle,
        reply: Reply,
        events: &EventSender,
    ) -> Completion {
        let Some(tracked) = self.requests.get_mut(&handle) else {
            debug!("Reply for unknown request {} ignored.", handle);
            return Completion::Ignored;
        };
        if tracked.finished {
            debug!("Request {} already finished, duplicate reply ignored.", handle);
            return Completion::Ignored;
        }

        tracked.finished = true;
        info!("Request {} finished.", handle);

        let origin = tracked.origin;
        let retry = match reply.error() {
            Some(kind)
                if kind.is_transient()
                    && self.retries_enabled
                    && tracked.retry_count < self.max_retries =>
            {
                Some(tracked.clone())
            }
            _ => None,
        };

        let completion = match (retry, reply.error()) {
            (Some(previous), _) => {
                let retry_count = previous.retry_count + 1;
                let new_handle = transport.submit(
                    previous.operation,
                    &previous.request,
                    previous.payload.clone(),
                    events,
                );
                info!(
                    "Retrying request {} as {} (retry {}/{}).",
                    handle, new_handle, retry_count, self.max_retries
                );
                self.requests.insert(
                    new_handle,
                    TrackedRequest {
                        handle: new_handle,
                        retry_count,
                        finished: false,
                        ..previous
                    },
                );
                Completion::Retried {
                    origin,
                    handle: new_handle,
                    retry_count,
                }
            }
            (None, Some(kind)) => Completion::Failed {
                origin,
                error: kind.describe(),
                reply,
            },
            (None, None) => Completion::Succeeded { origin, reply },
        };

        transport.dispose(handle, events);
        completion
    }

    /// The transport released the operation's resources
    pub fn on_disposed(&mut self, handle: RequestHandle) {
        if self.requests.remove(&handle).is_some() {
            info!("Reply {} destroyed.", handle);
        }
    }

    /// Abort every request that has not finished yet
    pub fn abort_all(&mut self, transport: &mut dyn Transport, events: &EventSender) -> usize {
        let active = self.active_handles();
        for handle in &active {
            info!("Aborting request {}.", handle);
            transport.abort(*handle, events);
        }
        active.len()
    }

    /// Stop re-issuing failures, used once a task timed out or teardown
    /// has started
    pub fn suspend_retries(&mut self) {
        self.retries_enabled = false;
    }

    pub fn resume_retries(&mut self) {
        self.retries_enabled = true;
    }

    /// Attribute requests issued from now on to `task`
    pub fn bind_task(&mut self, task: Option<TaskId>) {
        self.task = task;
    }

    pub fn current_task(&self) -> Option<TaskId> {
        self.task
    }

    /// Number of requests not finished yet
    pub fn active_count(&self) -> usize {
        self.requests.values().filter(|r| !r.finished).count()
    }

    pub fn active_handles(&self) -> Vec<RequestHandle> {
        let mut handles: Vec<_> = self
            .requests
            .values()
            .filter(|r| !r.finished)
            .map(|r| r.handle)
            .collect();
        handles.sort();
        handles
    }

    pub fn get(&self, handle: RequestHandle) -> Option<&TrackedRequest> {
        self.requests.get(&handle)
    }

    /// Entries still held, finished ones included until disposed
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

impl Default for RequestTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::event::channel;
    use crate::network::request::form_body;
    use crate::network::transport::MockTransport;
    use crate::utils::NetworkErrorKind;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn page() -> PageRequest {
        PageRequest::new("http://127.0.0.1:8088").unwrap()
    }

    fn counting_transport() -> MockTransport {
        let mut transport = MockTransport::new();
        let mut next = 0;
        transport.expect_submit().returning(move |_, _, _, _| {
            next += 1;
            RequestHandle::new(next)
        });
        transport.expect_dispose().returning(|_, _| ());
        transport
    }

    #[test]
    fn test_begin_tracks_request() {
        let (events, _inbox) = channel();
        let mut transport = counting_transport();
        let mut tracker = RequestTracker::new(3);

        let handle = tracker.begin(
            &mut transport,
            Operation::Post,
            page(),
            Some(form_body([("test", "1")])),
            &events,
        );

        let tracked = tracker.get(handle).unwrap();
        assert_eq!(tracked.retry_count(), 0);
        assert_eq!(tracked.origin(), handle);
        assert_eq!(tracked.payload().map(|p| &p[..]), Some(&b"test=1"[..]));
        assert_eq!(tracker.active_count(), 1);
    }

    #[test]
    fn test_bodyless_operation_keeps_no_payload() {
        let (events, _inbox) = channel();
        let mut transport = counting_transport();
        let mut tracker = RequestTracker::new(3);

        let handle = tracker.begin(
            &mut transport,
            Operation::Get,
            page(),
            Some(form_body([("test", "1")])),
            &events,
        );
        assert!(tracker.get(handle).unwrap().payload().is_none());
    }

    #[test]
    fn test_transient_failure_is_retried_with_same_payload() {
        let (events, _inbox) = channel();
        let mut transport = MockTransport::new();
        let mut next = 0;
        transport
            .expect_submit()
            .withf(|op, _, body, _| {
                *op == Operation::Post && body.as_deref() == Some(&b"test=1"[..])
            })
            .times(2)
            .returning(move |_, _, _, _| {
                next += 1;
                RequestHandle::new(next)
            });
        transport
            .expect_dispose()
            .withf(|handle, _| handle.get() == 1)
            .times(1)
            .returning(|_, _| ());

        let mut tracker = RequestTracker::new(3);
        let first = tracker.begin(
            &mut transport,
            Operation::Post,
            page(),
            Some(form_body([("test", "1")])),
            &events,
        );

        let completion = tracker.on_completed(
            &mut transport,
            first,
            Reply::failed(NetworkErrorKind::TemporaryNetworkFailure),
            &events,
        );

        let Completion::Retried {
            origin,
            handle,
            retry_count,
        } = completion
        else {
            panic!("expected a retry, got {:?}", completion);
        };
        assert_eq!(origin, first);
        assert_eq!(retry_count, 1);
        assert!(tracker.get(first).unwrap().is_finished());
        assert_eq!(tracker.get(handle).unwrap().retry_count(), 1);
        assert_eq!(tracker.active_handles(), vec![handle]);
        let retried = tracker.get(handle).unwrap();
        assert_eq!(retried.operation(), Operation::Post);
        assert_eq!(retried.request(), &page());
    }

    #[test]
    fn test_permanent_failure_is_recorded() {
        let (events, _inbox) = channel();
        let mut transport = MockTransport::new();
        transport
            .expect_submit()
            .times(1)
            .returning(|_, _, _, _| RequestHandle::new(7));
        transport.expect_dispose().times(1).returning(|_, _| ());

        let mut tracker = RequestTracker::new(3);
        let handle = tracker.begin(&mut transport, Operation::Get, page(), None, &events);

        let completion = tracker.on_completed(
            &mut transport,
            handle,
            Reply::failed(NetworkErrorKind::HostNotFound),
            &events,
        );

        assert_eq!(
            completion,
            Completion::Failed {
                origin: handle,
                error: "HostNotFound: Host not found".to_string(),
                reply: Reply::failed(NetworkErrorKind::HostNotFound),
            }
        );
        assert_eq!(tracker.active_count(), 0);
    }

    #[test]
    fn test_success_and_duplicate_reply() {
        let (events, _inbox) = channel();
        let mut transport = counting_transport();
        let mut tracker = RequestTracker::new(3);
        let handle = tracker.begin(&mut transport, Operation::Get, page(), None, &events);

        let first = tracker.on_completed(&mut transport, handle, Reply::new(200, "ok"), &events);
        assert!(matches!(first, Completion::Succeeded { .. }));

        let second = tracker.on_completed(&mut transport, handle, Reply::canceled(), &events);
        assert_eq!(second, Completion::Ignored);

        let unknown = tracker.on_completed(
            &mut transport,
            RequestHandle::new(99),
            Reply::new(200, ""),
            &events,
        );
        assert_eq!(unknown, Completion::Ignored);
    }

    #[test]
    fn test_disposed_requests_are_removed() {
        let (events, _inbox) = channel();
        let mut transport = counting_transport();
        let mut tracker = RequestTracker::new(3);
        let handle = tracker.begin(&mut transport, Operation::Get, page(), None, &events);
        tracker.on_completed(&mut transport, handle, Reply::new(200, ""), &events);

        assert_eq!(tracker.len(), 1);
        tracker.on_disposed(handle);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_abort_all_only_touches_active_requests() {
        let (events, _inbox) = channel();
        let mut transport = counting_transport();
        transport
            .expect_abort()
            .withf(|handle, _| handle.get() == 2)
            .times(1)
            .returning(|_, _| ());

        let mut tracker = RequestTracker::new(3);
        let done = tracker.begin(&mut transport, Operation::Get, page(), None, &events);
        tracker.begin(&mut transport, Operation::Get, page(), None, &events);
        tracker.on_completed(&mut transport, done, Reply::new(200, ""), &events);

        assert_eq!(tracker.abort_all(&mut transport, &events), 1);
    }

    #[test]
    fn test_suspended_retries() {
        let (events, _inbox) = channel();
        let mut transport = counting_transport();
        let mut tracker = RequestTracker::new(3);
        let handle = tracker.begin(&mut transport, Operation::Get, page(), None, &events);
        tracker.suspend_retries();

        let completion = tracker.on_completed(
            &mut transport,
            handle,
            Reply::failed(NetworkErrorKind::ContentReSend),
            &events,
        );
        assert!(matches!(completion, Completion::Failed { .. }));

        tracker.resume_retries();
        let handle = tracker.begin(&mut transport, Operation::Get, page(), None, &events);
        let completion = tracker.on_completed(
            &mut transport,
            handle,
            Reply::failed(NetworkErrorKind::ContentReSend),
            &events,
        );
        assert!(matches!(completion, Completion::Retried { retry_count: 1, .. }));
    }

    #[test]
    fn test_requests_remember_their_task() {
        let (events, _inbox) = channel();
        let mut transport = counting_transport();
        let mut tracker = RequestTracker::default();
        assert_eq!(tracker.max_retries(), DEFAULT_MAX_RETRIES);
        assert_eq!(tracker.current_task(), None);

        tracker.bind_task(Some(TaskId::new(1)));
        let first = tracker.begin(&mut transport, Operation::Get, page(), None, &events);
        let completion = tracker.on_completed(
            &mut transport,
            first,
            Reply::failed(NetworkErrorKind::TemporaryNetworkFailure),
            &events,
        );
        let Completion::Retried { handle: retry, .. } = completion else {
            panic!("expected a retry, got {:?}", completion);
        };

        tracker.bind_task(Some(TaskId::new(2)));
        let second = tracker.begin(&mut transport, Operation::Get, page(), None, &events);

        // retries stay attributed to the task of the first attempt
        assert_eq!(tracker.get(retry).unwrap().task(), Some(TaskId::new(1)));
        assert_eq!(tracker.get(second).unwrap().task(), Some(TaskId::new(2)));
    }

    proptest! {
        #[test]
        fn test_retries_stop_at_limit(max_retries in 0u32..6) {
            let (events, _inbox) = channel();
            let mut transport = counting_transport();
            let mut tracker = RequestTracker::new(max_retries);
            let mut handle = tracker.begin(
                &mut transport,
                Operation::Post,
                page(),
                Some(form_body([("test", "1")])),
                &events,
            );

            let mut retries = 0;
            loop {
                let reply = Reply::failed(NetworkErrorKind::ContentReSend);
                match tracker.on_completed(&mut transport, handle, reply, &events) {
                    Completion::Retried { handle: next, retry_count, .. } => {
                        retries += 1;
                        prop_assert_eq!(retry_count, retries);
                        prop_assert_eq!(
                            tracker.get(next).and_then(|r| r.payload()).map(|p| &p[..]),
                            Some(&b"test=1"[..])
                        );
                        handle = next;
                    }
                    Completion::Failed { error, .. } => {
                        prop_assert!(error.starts_with("ContentReSend"));
                        break;
                    }
                    other => prop_assert!(false, "unexpected completion {:?}", other),
                }
            }

            prop_assert_eq!(retries, max_retries);
            prop_assert_eq!(tracker.active_count(), 0);
        }
    }
}
