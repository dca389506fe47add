//! HTTP transport over a pooled reqwest client

use std::collections::HashMap;
use std::error::Error as _;
use std::io;

use log::{debug, info};
use tokio::task::JoinHandle;

use super::reply::Reply;
use super::request::{Operation, PageRequest, Payload};
use super::transport::{RequestHandle, Transport};
use crate::browser::event::{DestroyAck, EventSender};
use crate::config::BrowserConfig;
use crate::utils::{NetworkErrorKind, Result};

/// Transport issuing every operation as its own tokio task.
///
/// Must be used from within a tokio runtime.
pub struct HttpTransport {
    client: reqwest::Client,
    next_handle: u64,
    in_flight: HashMap<RequestHandle, JoinHandle<()>>,
    released: bool,
}

impl HttpTransport {
    /// Create a transport with the configured user agent
    pub fn new(config: &BrowserConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self::with_client(client))
    }

    /// Wrap an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            next_handle: 0,
            in_flight: HashMap::new(),
            released: false,
        }
    }

    /// Operations whose task has not been disposed yet
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

impl Transport for HttpTransport {
    fn submit(
        &mut self,
        operation: Operation,
        request: &PageRequest,
        body: Option<Payload>,
        events: &EventSender,
    ) -> RequestHandle {
        self.next_handle += 1;
        let handle = RequestHandle::new(self.next_handle);

        if self.released {
            events.request_finished(handle, Reply::canceled());
            return handle;
        }

        let mut builder = self
            .client
            .request(method(operation), request.url().clone());
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let preview = body.as_ref().map(body_preview);
        if operation.carries_body() {
            builder = builder.body(body.unwrap_or_default());
        }

        let request_headers = request.headers().clone();
        let events = events.clone();
        let task = tokio::spawn(async move {
            let reply = match builder.send().await {
                Ok(response) => read_reply(response).await,
                Err(err) => Reply::failed(classify(&err)),
            };
            log_reply(handle, &request_headers, preview.as_deref(), &reply);
            events.request_finished(handle, reply);
        });

        self.in_flight.insert(handle, task);
        handle
    }

    fn abort(&mut self, handle: RequestHandle, events: &EventSender) {
        if let Some(task) = self.in_flight.remove(&handle) {
            task.abort();
            events.request_finished(handle, Reply::canceled());
        }
    }

    fn dispose(&mut self, handle: RequestHandle, events: &EventSender) {
        // finished tasks are simply detached
        self.in_flight.remove(&handle);
        events.request_disposed(handle);
    }

    fn release(&mut self, ack: DestroyAck) {
        for (_, task) in self.in_flight.drain() {
            task.abort();
        }
        self.released = true;
        info!("HTTP transport released.");
        ack.acknowledge();
    }
}

fn method(operation: Operation) -> reqwest::Method {
    match operation {
        Operation::Head => reqwest::Method::HEAD,
        Operation::Get => reqwest::Method::GET,
        Operation::Put => reqwest::Method::PUT,
        Operation::Post => reqwest::Method::POST,
        Operation::Delete => reqwest::Method::DELETE,
    }
}

/// Header values as text; bytes that are not UTF-8 are replaced, not dropped
fn header_values(headers: &reqwest::header::HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .map(|(k, v)| {
            (
                k.as_str().to_string(),
                String::from_utf8_lossy(v.as_bytes()).into_owned(),
            )
        })
        .collect()
}

async fn read_reply(response: reqwest::Response) -> Reply {
    let url = response.url().clone();
    let status = response.status();
    let headers = header_values(response.headers());

    match response.bytes().await {
        Ok(body) => {
            let mut reply = Reply::new(status.as_u16(), body)
                .with_url(url)
                .with_headers(headers);
            if let Some(reason) = status.canonical_reason() {
                reply = reply.with_reason(reason);
            }
            reply
        }
        Err(err) => Reply::failed(classify(&err)).with_url(url),
    }
}

/// Map a client failure onto the error classes the tracker understands
pub(crate) fn classify(err: &reqwest::Error) -> NetworkErrorKind {
    if err.is_timeout() {
        return NetworkErrorKind::Timeout;
    }
    if err.is_redirect() {
        return NetworkErrorKind::ProtocolFailure;
    }

    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            match io_err.kind() {
                io::ErrorKind::ConnectionRefused => return NetworkErrorKind::ConnectionRefused,
                io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe => return NetworkErrorKind::TemporaryNetworkFailure,
                io::ErrorKind::UnexpectedEof => return NetworkErrorKind::ContentReSend,
                io::ErrorKind::TimedOut => return NetworkErrorKind::Timeout,
                _ => {}
            }
        }

        let text = cause.to_string();
        if text.contains("dns error") || text.contains("failed to lookup address") {
            return NetworkErrorKind::HostNotFound;
        }
        if text.contains("connection closed before message completed") {
            return NetworkErrorKind::ContentReSend;
        }
        source = cause.source();
    }

    if err.is_body() || err.is_decode() {
        NetworkErrorKind::RemoteHostClosed
    } else {
        NetworkErrorKind::UnknownNetwork
    }
}

const BODY_PREVIEW_LEN: usize = 256;

fn body_preview(body: &Payload) -> String {
    String::from_utf8_lossy(&body[..body.len().min(BODY_PREVIEW_LEN)]).into_owned()
}

fn log_reply(
    handle: RequestHandle,
    request_headers: &HashMap<String, String>,
    request_body: Option<&str>,
    reply: &Reply,
) {
    let url = reply.url().map(|u| u.as_str()).unwrap_or("");
    debug!("REQUEST {}", handle);
    debug!("URL: {}", url);
    debug!(
        "STATUS CODE: {} {}",
        reply.status().map(|s| s.to_string()).unwrap_or_default(),
        reply.reason().unwrap_or("")
    );
    if reply.is_redirect() {
        if let Some(location) = reply.location() {
            debug!("REDIRECT TO: {}", location);
        }
    }
    if let Some(kind) = reply.error() {
        debug!("ERROR: {}", kind.describe());
    }

    debug!("REQUEST HEADERS:");
    for (name, value) in request_headers {
        debug!("    {}: {}", name, value);
    }
    if let Some(body) = request_body {
        debug!("REQUEST BODY: {}", body);
    }
    debug!("RESPONSE HEADERS:");
    for (name, value) in reply.headers() {
        debug!("    {}: {}", name, value);
    }
    debug!("{}", "-".repeat(50));
}
