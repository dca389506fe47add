//! Task coordination
//!
//! A [`Browser`] owns a rendering engine, a transport and the request
//! tracker between them, and runs one task (one page load) at a time.
//! Transport completions, timers and driver commands are all funneled
//! through a single event queue, so every state transition happens on the
//! task running [`Browser::run`].
//!
//! A task ends in exactly one of three ways: the engine reports
//! render-complete and every tracked request has drained, the deadline
//! expires, or the browser is shut down. Whichever comes first produces the
//! task's only [`TaskResult`].

pub mod event;
mod shutdown;
mod task;
mod timeout;

pub use event::{BrowserEvent, DestroyAck, EventSender, channel};
pub use shutdown::{Component, ShutdownCallback, ShutdownCoordinator, ShutdownRequest};
pub use task::{LoadStatus, Task, TaskId, TaskResult, TaskState};
pub use timeout::{TIMEOUT_MESSAGE, TimeoutController, TimeoutState};

use std::panic::{self, AssertUnwindSafe};

use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::BrowserConfig;
use crate::engine::{DocumentPage, RenderingEngine};
use crate::network::{
    Completion, HttpTransport, NetworkAccess, Operation, PageRequest, Payload, Reply,
    RequestHandle, RequestTracker, Transport,
};
use crate::utils::{BrowserError, Result};

/// Driver callback receiving each task's result
pub type ResultCallback = Box<dyn FnMut(TaskResult, &BrowserHandle)>;

/// Single-task page loader with retries, a deadline and coordinated shutdown
pub struct Browser {
    config: BrowserConfig,
    engine: Box<dyn RenderingEngine>,
    transport: Box<dyn Transport>,
    tracker: RequestTracker,
    timeout: TimeoutController,
    shutdown: ShutdownCoordinator,
    task: Option<Task>,
    next_task: u64,
    drain_timer: Option<JoinHandle<()>>,
    on_result: ResultCallback,
    handle: BrowserHandle,
    events: EventSender,
    inbox: mpsc::UnboundedReceiver<BrowserEvent>,
}

impl Browser {
    pub fn new<E, T, F>(config: BrowserConfig, engine: E, transport: T, on_result: F) -> Self
    where
        E: RenderingEngine + 'static,
        T: Transport + 'static,
        F: FnMut(TaskResult, &BrowserHandle) + 'static,
    {
        let (events, inbox) = channel();
        Self {
            tracker: RequestTracker::new(config.max_request_retries),
            timeout: TimeoutController::new(config.timeout()),
            shutdown: ShutdownCoordinator::new(),
            engine: Box::new(engine),
            transport: Box::new(transport),
            task: None,
            next_task: 0,
            drain_timer: None,
            on_result: Box::new(on_result),
            handle: BrowserHandle {
                events: events.clone(),
            },
            events,
            inbox,
            config,
        }
    }

    /// Browser over the HTTP transport and the document page engine.
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_http<F>(config: BrowserConfig, on_result: F) -> Result<Self>
    where
        F: FnMut(TaskResult, &BrowserHandle) + 'static,
    {
        config.validate()?;
        let transport = HttpTransport::new(&config)?;
        let engine = DocumentPage::new(config.engine);
        Ok(Self::new(config, engine, transport, on_result))
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }

    /// Handle for posting commands from callbacks or other tasks
    pub fn handle(&self) -> BrowserHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> TaskState {
        self.task
            .as_ref()
            .map(|task| task.state())
            .unwrap_or(TaskState::Idle)
    }

    pub fn active_requests(&self) -> usize {
        self.tracker.active_count()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_complete()
    }

    /// Start a task from raw driver input.
    ///
    /// `method` is matched case-insensitively against HEAD, GET, PUT, POST
    /// and DELETE.
    pub fn perform<K, V>(
        &mut self,
        method: &str,
        url: &str,
        headers: impl IntoIterator<Item = (K, V)>,
        body: Option<Payload>,
    ) -> Result<TaskId>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let operation: Operation = method.parse()?;
        let request = PageRequest::new(url)?.with_headers(headers);
        self.perform_request(operation, request, body)
    }

    /// Start a task. Fails while another task is running or once shutdown
    /// has been requested.
    pub fn perform_request(
        &mut self,
        operation: Operation,
        request: PageRequest,
        body: Option<Payload>,
    ) -> Result<TaskId> {
        if self.shutdown.is_requested() {
            return Err(BrowserError::ShutDown);
        }
        if self.task.is_some() {
            return Err(BrowserError::TaskInProgress);
        }

        self.next_task += 1;
        let id = TaskId::new(self.next_task);
        info!("{} started: {} {}", id, operation, request.url());

        self.task = Some(Task::new(id, operation, request.clone()));
        self.tracker.resume_retries();
        self.tracker.bind_task(Some(id));
        self.timeout.arm(id, &self.events);

        let mut net = NetworkAccess::new(&mut self.tracker, self.transport.as_mut(), &self.events);
        self.engine.load(operation, &request, body, &mut net);
        Ok(id)
    }

    /// Tear the browser down; `on_complete` runs once the transport, page
    /// and view have all confirmed their destruction. A running task is
    /// finished with an aborted result before that.
    pub fn shutdown<F>(&mut self, on_complete: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.request_shutdown(Box::new(on_complete));
    }

    fn request_shutdown(&mut self, on_complete: ShutdownCallback) {
        match self.shutdown.request(on_complete) {
            ShutdownRequest::Started => {}
            ShutdownRequest::Pending | ShutdownRequest::AlreadyComplete => return,
        }

        self.shutdown.stop_activity(
            self.engine.as_mut(),
            &mut self.tracker,
            self.transport.as_mut(),
            &self.events,
        );
        if let Some(task) = &self.task {
            // queued behind the canceled replies, ahead of the acknowledgements
            self.events.send(BrowserEvent::RenderComplete {
                task: Some(task.id()),
                status: LoadStatus::Aborted,
            });
        }
        self.shutdown
            .destroy_components(self.engine.as_mut(), self.transport.as_mut(), &self.events);
    }

    /// Process events until shutdown completes
    pub async fn run(&mut self) {
        while !self.shutdown.is_complete() {
            let Some(event) = self.inbox.recv().await else {
                break;
            };
            self.dispatch(event);
        }
    }

    /// Process events until the running task has delivered its result.
    ///
    /// Returns immediately if no task is running.
    pub async fn run_until_idle(&mut self) {
        while self.task.is_some() && !self.shutdown.is_complete() {
            let Some(event) = self.inbox.recv().await else {
                break;
            };
            self.dispatch(event);
        }
    }

    /// Apply one event
    pub fn dispatch(&mut self, event: BrowserEvent) {
        debug!("Dispatching {:?}", event);
        match event {
            BrowserEvent::RequestFinished { handle, reply } => self.on_request_finished(handle, reply),
            BrowserEvent::RequestDisposed(handle) => self.tracker.on_disposed(handle),
            BrowserEvent::RenderComplete { task, status } => self.on_render_complete(task, status),
            BrowserEvent::TimeoutFired(task) => self.on_timeout(task),
            BrowserEvent::DrainCheck { task, status } => self.check_drain(task, status),
            BrowserEvent::Destroyed(component) => {
                self.shutdown.acknowledge(component);
            }
            BrowserEvent::Perform {
                operation,
                request,
                body,
            } => {
                if let Err(err) = self.perform_request(operation, request, body) {
                    warn!("Task rejected: {}", err);
                    self.deliver(TaskResult::rejected(err.to_string()));
                }
            }
            BrowserEvent::Shutdown(on_complete) => self.request_shutdown(on_complete),
        }
    }

    fn on_request_finished(&mut self, handle: RequestHandle, reply: Reply) {
        let owner = self.tracker.get(handle).and_then(|tracked| tracked.task());
        let completion =
            self.tracker
                .on_completed(self.transport.as_mut(), handle, reply, &self.events);
        let (origin, reply) = match completion {
            Completion::Retried { .. } | Completion::Ignored => return,
            Completion::Succeeded { origin, reply } => (origin, reply),
            Completion::Failed {
                origin,
                error,
                reply,
            } => {
                match self.task.as_mut() {
                    Some(task) if owner == Some(task.id()) => task.record_error(error),
                    _ => warn!("Request {} failed outside of its task: {}", handle, error),
                }
                (origin, reply)
            }
        };

        let mut net = NetworkAccess::new(&mut self.tracker, self.transport.as_mut(), &self.events);
        self.engine.request_finished(origin, &reply, &mut net);
    }

    fn on_render_complete(&mut self, target: Option<TaskId>, status: LoadStatus) {
        let Some(task) = &self.task else {
            info!("Render complete emitted, but no task is running.");
            return;
        };
        if target.is_some_and(|id| id != task.id()) {
            debug!("Render complete for a finished task ignored.");
            return;
        }

        if status.is_synthetic() || task.is_timed_out() {
            self.finalize(status);
        } else {
            let id = task.id();
            self.check_drain(id, status);
        }
    }

    fn check_drain(&mut self, id: TaskId, status: LoadStatus) {
        let Some(task) = &self.task else {
            return;
        };
        if task.id() != id {
            return;
        }

        let pending = self.tracker.active_handles();
        if !pending.is_empty() {
            let pending: Vec<String> = pending.iter().map(ToString::to_string).collect();
            info!(
                "Render complete emitted, waiting for requests: {}",
                pending.join(", ")
            );
            if let Some(timer) = self.drain_timer.take() {
                timer.abort();
            }
            self.drain_timer = Some(self.events.send_after(
                self.config.drain_interval(),
                BrowserEvent::DrainCheck { task: id, status },
            ));
            return;
        }

        self.finalize(status);
    }

    fn on_timeout(&mut self, id: TaskId) {
        let Some(task) = self.task.as_mut() else {
            debug!("Deadline for {} fired with no task running.", id);
            return;
        };
        if !self
            .timeout
            .expire(id, task, &mut self.tracker, self.transport.as_mut(), &self.events)
        {
            debug!("Stale deadline for {} ignored.", id);
        }
    }

    fn finalize(&mut self, status: LoadStatus) {
        self.timeout.clear();
        if let Some(timer) = self.drain_timer.take() {
            timer.abort();
        }
        let Some(task) = self.task.take() else {
            return;
        };
        self.tracker.bind_task(None);

        let id = task.id();
        let elapsed = task.elapsed();
        let (operation, url) = (task.operation(), task.request().url().to_string());
        let result = task.finish(
            self.engine.current_url(),
            self.engine.document_text(),
            status.is_ok(),
        );
        info!(
            "{} finished in {:?}: {} {} ({:?}, successful: {}).",
            id, elapsed, operation, url, status, result.successful
        );
        self.deliver(result);
    }

    fn deliver(&mut self, result: TaskResult) {
        if self.shutdown.is_complete() {
            warn!("Browser already shut down, result discarded.");
            return;
        }
        let handle = self.handle.clone();
        let on_result = &mut *self.on_result;
        if panic::catch_unwind(AssertUnwindSafe(|| on_result(result, &handle))).is_err() {
            error!("Result callback panicked.");
        }
    }
}

/// Posts commands to a [`Browser`] through its event queue
#[derive(Debug, Clone)]
pub struct BrowserHandle {
    events: EventSender,
}

impl BrowserHandle {
    /// Queue a task. Input is validated here, a rejection by the browser
    /// itself (busy, shut down) arrives as a failed result.
    pub fn perform<K, V>(
        &self,
        method: &str,
        url: &str,
        headers: impl IntoIterator<Item = (K, V)>,
        body: Option<Payload>,
    ) -> Result<()>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let operation: Operation = method.parse()?;
        let request = PageRequest::new(url)?.with_headers(headers);
        self.perform_request(operation, request, body);
        Ok(())
    }

    pub fn perform_request(&self, operation: Operation, request: PageRequest, body: Option<Payload>) {
        self.events.send(BrowserEvent::Perform {
            operation,
            request,
            body,
        });
    }

    pub fn shutdown<F>(&self, on_complete: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.events.send(BrowserEvent::Shutdown(Box::new(on_complete)));
    }
}
