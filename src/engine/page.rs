//! Document page engine

use log::{debug, info};
use url::Url;

use super::{EngineSettings, RenderingEngine};
use crate::browser::{Component, DestroyAck, LoadStatus};
use crate::network::{NetworkAccess, Operation, PageRequest, Payload, Reply, RequestHandle};

/// Document text reported before any navigation completed
pub const BLANK_DOCUMENT: &str = "<html><head></head><body></body></html>";

/// Engine rendering the main document's body as the page text
#[derive(Debug, Default)]
pub struct DocumentPage {
    settings: EngineSettings,
    main_request: Option<RequestHandle>,
    url: Option<Url>,
    document: Option<String>,
    stopped: bool,
    closed: bool,
}

impl DocumentPage {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            ..Default::default()
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Whether a main-document load is in progress
    pub fn is_loading(&self) -> bool {
        self.main_request.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl RenderingEngine for DocumentPage {
    fn load(
        &mut self,
        operation: Operation,
        request: &PageRequest,
        body: Option<Payload>,
        net: &mut NetworkAccess<'_>,
    ) {
        self.url = None;
        self.document = None;
        self.stopped = false;
        let handle = net.request(operation, request.clone(), body);
        debug!("Loading {} {} as request {}.", operation, request.url(), handle);
        self.main_request = Some(handle);
    }

    fn request_finished(&mut self, origin: RequestHandle, reply: &Reply, net: &mut NetworkAccess<'_>) {
        if self.main_request != Some(origin) || self.stopped {
            return;
        }
        self.main_request = None;

        // any response, even an error page, is a rendered document
        match reply.status() {
            Some(_) => {
                self.url = reply.url().cloned();
                self.document = Some(reply.text());
                net.render_complete(LoadStatus::Loaded);
            }
            None => net.render_complete(LoadStatus::Failed),
        }
    }

    fn current_url(&self) -> String {
        self.url.as_ref().map(|u| u.to_string()).unwrap_or_default()
    }

    fn document_text(&self) -> String {
        self.document
            .clone()
            .unwrap_or_else(|| BLANK_DOCUMENT.to_string())
    }

    fn stop(&mut self) {
        self.stopped = true;
        self.main_request = None;
        self.settings.javascript = false;
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn release(&mut self, ack: DestroyAck) {
        match ack.component() {
            Component::Page => {
                self.url = None;
                self.document = None;
            }
            Component::View => self.closed = true,
            Component::Transport => {}
        }
        info!("Document page released {}.", ack.component());
        ack.acknowledge();
    }
}
