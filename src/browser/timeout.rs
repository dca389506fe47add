//! Task deadline

use std::time::Duration;

use log::info;
use tokio::task::JoinHandle;

use super::event::{BrowserEvent, EventSender};
use super::task::{LoadStatus, Task, TaskId};
use crate::network::{RequestTracker, Transport};

/// Notice recorded in the task's error list when the deadline expires
pub const TIMEOUT_MESSAGE: &str = "Request timed out.";

/// Deadline state of the current task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutState {
    Disarmed,
    Armed,
    Fired,
    Cleared,
}

/// One-shot deadline per task
#[derive(Debug)]
pub struct TimeoutController {
    duration: Duration,
    state: TimeoutState,
    task: Option<TaskId>,
    timer: Option<JoinHandle<()>>,
}

impl TimeoutController {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            state: TimeoutState::Disarmed,
            task: None,
            timer: None,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn state(&self) -> TimeoutState {
        self.state
    }

    /// Start the deadline for `task`, replacing any previous one
    pub fn arm(&mut self, task: TaskId, events: &EventSender) {
        self.cancel_timer();
        self.timer = Some(events.send_after(self.duration, BrowserEvent::TimeoutFired(task)));
        self.task = Some(task);
        self.state = TimeoutState::Armed;
    }

    /// Apply an expiry to the running task.
    ///
    /// Records the timeout notice, stops retries, aborts every active request
    /// and queues a synthetic `TimedOut` render-complete behind the canceled
    /// replies. Retries stay off until the next task starts.
    /// Returns false for a stale expiry, i.e. one for another task or one
    /// arriving after the deadline was cleared.
    pub fn expire(
        &mut self,
        fired: TaskId,
        task: &mut Task,
        tracker: &mut RequestTracker,
        transport: &mut dyn Transport,
        events: &EventSender,
    ) -> bool {
        if self.state != TimeoutState::Armed
            || self.task != Some(fired)
            || fired != task.id()
        {
            return false;
        }
        self.state = TimeoutState::Fired;
        self.timer = None;

        info!("{} timed out after {:?}.", task.id(), self.duration);
        task.record_error(TIMEOUT_MESSAGE);
        task.mark_timed_out();

        tracker.suspend_retries();
        tracker.abort_all(transport, events);
        events.send(BrowserEvent::RenderComplete {
            task: Some(task.id()),
            status: LoadStatus::TimedOut,
        });
        true
    }

    /// Cancel the pending deadline
    pub fn clear(&mut self) {
        self.cancel_timer();
        if matches!(self.state, TimeoutState::Armed | TimeoutState::Fired) {
            self.state = TimeoutState::Cleared;
        }
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl Drop for TimeoutController {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::event::channel;
    use crate::network::{Completion, MockTransport, Operation, PageRequest, Reply, RequestHandle};
    use crate::utils::NetworkErrorKind;
    use pretty_assertions::assert_eq;

    fn task(id: u64) -> Task {
        Task::new(
            TaskId::new(id),
            Operation::Get,
            PageRequest::new("http://127.0.0.1:8088").unwrap(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_records_notice_and_aborts() {
        let (events, mut inbox) = channel();
        let mut transport = MockTransport::new();
        transport
            .expect_submit()
            .returning(|_, _, _, _| RequestHandle::new(1));
        transport
            .expect_abort()
            .times(1)
            .returning(|handle, events| events.request_finished(handle, Reply::canceled()));
        transport.expect_dispose().returning(|_, _| ());

        let mut tracker = RequestTracker::new(3);
        let page = PageRequest::new("http://127.0.0.1:8088").unwrap();
        tracker.begin(&mut transport, Operation::Get, page, None, &events);

        let mut controller = TimeoutController::new(Duration::from_millis(1000));
        assert_eq!(controller.duration(), Duration::from_millis(1000));
        let mut task = task(1);
        controller.arm(task.id(), &events);

        let Some(BrowserEvent::TimeoutFired(fired)) = inbox.recv().await else {
            panic!("deadline did not fire");
        };
        assert_eq!(fired, task.id());
        assert!(controller.expire(fired, &mut task, &mut tracker, &mut transport, &events));

        assert_eq!(controller.state(), TimeoutState::Fired);
        assert_eq!(task.errors(), &[TIMEOUT_MESSAGE.to_string()]);
        assert!(task.is_timed_out());

        // a transient failure already in flight must not be re-issued
        let late = tracker.on_completed(
            &mut transport,
            RequestHandle::new(1),
            Reply::failed(NetworkErrorKind::ContentReSend),
            &events,
        );
        assert!(matches!(late, Completion::Failed { .. }));
        // canceled replies are queued ahead of the synthetic render-complete
        assert!(matches!(
            inbox.recv().await,
            Some(BrowserEvent::RequestFinished { .. })
        ));
        assert!(matches!(
            inbox.recv().await,
            Some(BrowserEvent::RenderComplete {
                status: LoadStatus::TimedOut,
                ..
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_expiry_is_ignored() {
        let (events, _inbox) = channel();
        let mut transport = MockTransport::new();
        let mut tracker = RequestTracker::new(3);
        let mut controller = TimeoutController::new(Duration::from_millis(1000));

        let mut first = task(1);
        controller.arm(first.id(), &events);
        controller.clear();
        assert_eq!(controller.state(), TimeoutState::Cleared);
        assert!(!controller.expire(first.id(), &mut first, &mut tracker, &mut transport, &events));
        assert!(first.errors().is_empty());

        let mut second = task(2);
        controller.arm(second.id(), &events);
        // the first task's deadline arriving late must not expire the second
        assert!(!controller.expire(first.id(), &mut second, &mut tracker, &mut transport, &events));
        assert_eq!(controller.state(), TimeoutState::Armed);
        assert!(second.errors().is_empty());
        controller.clear();
        assert!(!controller.expire(second.id(), &mut second, &mut tracker, &mut transport, &events));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleared_deadline_never_fires() {
        let (events, mut inbox) = channel();
        let mut controller = TimeoutController::new(Duration::from_millis(100));
        controller.arm(TaskId::new(1), &events);
        controller.clear();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(inbox.try_recv().is_err());
    }
}
