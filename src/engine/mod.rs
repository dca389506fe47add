//! Rendering engine seam
//!
//! The browser treats the engine as a black box: it is told to load a
//! request, issues its own network traffic through a [`NetworkAccess`], and
//! reports a render-complete event when done. [`DocumentPage`] is the
//! built-in engine, it renders the main document's text without executing
//! scripts.

mod page;

pub use page::{BLANK_DOCUMENT, DocumentPage};

use serde::{Deserialize, Serialize};

use crate::browser::DestroyAck;
use crate::network::{NetworkAccess, Operation, PageRequest, Payload, Reply, RequestHandle};

/// Page-level switches passed through to the engine untouched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Load images automatically
    pub images: bool,
    /// Execute page scripts
    pub javascript: bool,
    /// Allow scripts to open windows
    pub popups: bool,
    /// Do not keep history or storage
    pub private_browsing: bool,
}

/// A page-rendering engine driven by the browser
pub trait RenderingEngine {
    /// Start loading `request`; completion is reported through
    /// [`NetworkAccess::render_complete`]
    fn load(
        &mut self,
        operation: Operation,
        request: &PageRequest,
        body: Option<Payload>,
        net: &mut NetworkAccess<'_>,
    );

    /// A request issued by the engine reached a terminal state. `origin` is
    /// the handle returned when it was first issued, retries included.
    fn request_finished(&mut self, origin: RequestHandle, reply: &Reply, net: &mut NetworkAccess<'_>);

    /// URL of the current document, empty if navigation never resolved
    fn current_url(&self) -> String;

    /// Text of the current document
    fn document_text(&self) -> String;

    /// Stop navigation and any running script
    fn stop(&mut self);

    /// Close the view
    fn close(&mut self);

    /// Destroy the page model or the view, named by `ack.component()`
    fn release(&mut self, ack: DestroyAck);
}
