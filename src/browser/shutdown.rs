//! Coordinated teardown of the browser's owned components

use std::fmt;

use log::{debug, info};

use super::event::{DestroyAck, EventSender};
use crate::engine::RenderingEngine;
use crate::network::{RequestTracker, Transport};

/// Callback invoked once shutdown has completed
pub type ShutdownCallback = Box<dyn FnOnce() + Send>;

/// Components whose destruction must be confirmed before shutdown completes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    Transport,
    Page,
    View,
}

impl Component {
    pub const ALL: [Component; 3] = [Component::Transport, Component::Page, Component::View];

    fn index(&self) -> usize {
        match self {
            Component::Transport => 0,
            Component::Page => 1,
            Component::View => 2,
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Component::Transport => "transport",
            Component::Page => "page",
            Component::View => "view",
        })
    }
}

/// How a `request` call was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownRequest {
    /// First request, teardown must be started by the caller
    Started,
    /// Teardown already under way, the callback will fire on completion
    Pending,
    /// Teardown already completed, the callback fired immediately
    AlreadyComplete,
}

/// Joins the destruction acknowledgements of the three owned components
#[derive(Default)]
pub struct ShutdownCoordinator {
    requested: bool,
    completed: bool,
    destroyed: [bool; 3],
    callbacks: Vec<ShutdownCallback>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_requested(&self) -> bool {
        self.requested
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    pub fn is_destroyed(&self, component: Component) -> bool {
        self.destroyed[component.index()]
    }

    /// Register a completion callback
    pub fn request(&mut self, on_complete: ShutdownCallback) -> ShutdownRequest {
        if self.completed {
            on_complete();
            return ShutdownRequest::AlreadyComplete;
        }
        self.callbacks.push(on_complete);
        if self.requested {
            ShutdownRequest::Pending
        } else {
            self.requested = true;
            ShutdownRequest::Started
        }
    }

    /// Stop the page and cancel every request still in flight
    pub fn stop_activity(
        &mut self,
        engine: &mut dyn RenderingEngine,
        tracker: &mut RequestTracker,
        transport: &mut dyn Transport,
        events: &EventSender,
    ) {
        engine.stop();
        engine.close();
        tracker.suspend_retries();
        let aborted = tracker.abort_all(transport, events);
        info!("Shutdown started, {} active request(s) aborted.", aborted);
    }

    /// Ask every owned component to destroy itself
    pub fn destroy_components(
        &mut self,
        engine: &mut dyn RenderingEngine,
        transport: &mut dyn Transport,
        events: &EventSender,
    ) {
        engine.release(DestroyAck::new(Component::Page, events.clone()));
        engine.release(DestroyAck::new(Component::View, events.clone()));
        transport.release(DestroyAck::new(Component::Transport, events.clone()));
    }

    /// Record one acknowledgement, returns true if it completed the shutdown
    pub fn acknowledge(&mut self, component: Component) -> bool {
        if !self.requested || self.completed {
            debug!("Ignoring destruction of {} outside of shutdown.", component);
            return false;
        }
        if self.is_destroyed(component) {
            debug!("Component {} already destroyed.", component);
            return false;
        }
        info!("Component {} destroyed.", component);
        self.destroyed[component.index()] = true;

        if !self.destroyed.iter().all(|d| *d) {
            return false;
        }
        self.completed = true;
        info!("Shutdown complete.");
        for callback in self.callbacks.drain(..) {
            callback();
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, ShutdownCallback) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = count.clone();
        (
            count,
            Box::new(move || {
                inner.fetch_add(1, Ordering::SeqCst);
            }),
        )
    }

    #[test]
    fn test_completes_in_any_order() {
        let orders = [
            [Component::Transport, Component::Page, Component::View],
            [Component::Transport, Component::View, Component::Page],
            [Component::Page, Component::Transport, Component::View],
            [Component::Page, Component::View, Component::Transport],
            [Component::View, Component::Transport, Component::Page],
            [Component::View, Component::Page, Component::Transport],
        ];

        for order in orders {
            let mut coordinator = ShutdownCoordinator::new();
            let (count, callback) = counter();
            assert_eq!(coordinator.request(callback), ShutdownRequest::Started);

            assert!(!coordinator.acknowledge(order[0]));
            assert!(!coordinator.acknowledge(order[1]));
            assert_eq!(count.load(Ordering::SeqCst), 0);
            assert!(coordinator.acknowledge(order[2]));
            assert_eq!(count.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn test_duplicate_ack_does_not_complete() {
        let mut coordinator = ShutdownCoordinator::new();
        let (count, callback) = counter();
        coordinator.request(callback);

        assert!(!coordinator.is_destroyed(Component::Page));
        coordinator.acknowledge(Component::Page);
        coordinator.acknowledge(Component::Page);
        coordinator.acknowledge(Component::View);
        assert!(coordinator.is_destroyed(Component::Page));
        assert!(!coordinator.is_destroyed(Component::Transport));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(!coordinator.is_complete());

        coordinator.acknowledge(Component::Transport);
        coordinator.acknowledge(Component::Transport);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_ack_without_request_is_ignored() {
        let mut coordinator = ShutdownCoordinator::new();
        for component in Component::ALL {
            assert!(!coordinator.acknowledge(component));
        }
        assert!(!coordinator.is_complete());
    }

    #[test]
    fn test_every_caller_is_notified_once() {
        let mut coordinator = ShutdownCoordinator::new();
        let (first, first_cb) = counter();
        let (second, second_cb) = counter();
        let (late, late_cb) = counter();

        assert_eq!(coordinator.request(first_cb), ShutdownRequest::Started);
        assert_eq!(coordinator.request(second_cb), ShutdownRequest::Pending);
        for component in Component::ALL {
            coordinator.acknowledge(component);
        }
        assert_eq!(coordinator.request(late_cb), ShutdownRequest::AlreadyComplete);

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(late.load(Ordering::SeqCst), 1);
    }
}
