//! Terminal result of one transport operation

use std::collections::HashMap;

use bytes::Bytes;
use url::Url;

use crate::utils::NetworkErrorKind;

/// What the transport reports when an operation completes, successfully or not
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reply {
    url: Option<Url>,
    status: Option<u16>,
    reason: Option<String>,
    headers: HashMap<String, String>,
    body: Bytes,
    error: Option<NetworkErrorKind>,
}

impl Reply {
    /// Create a reply for a received response
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status: Some(status),
            error: NetworkErrorKind::from_status(status),
            body: body.into(),
            ..Default::default()
        }
    }

    /// Create a reply for an operation that never produced a response
    pub fn failed(kind: NetworkErrorKind) -> Self {
        Self {
            error: Some(kind),
            ..Default::default()
        }
    }

    /// Reply posted for an aborted operation
    pub fn canceled() -> Self {
        Self::failed(NetworkErrorKind::OperationCanceled)
    }

    pub fn with_url(mut self, url: Url) -> Self {
        self.url = Some(url);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    /// Add a header
    pub fn add_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(key.into().to_ascii_lowercase(), value.into());
    }

    /// Final URL after redirects
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn error(&self) -> Option<NetworkErrorKind> {
        self.error
    }

    /// Completed without any error
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Check if the response is a redirect (3xx)
    pub fn is_redirect(&self) -> bool {
        self.status.is_some_and(|s| (300..400).contains(&s))
    }

    /// Redirect target announced by the server, if any
    pub fn location(&self) -> Option<&str> {
        self.header("location")
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Get a specific header, names are stored lowercase
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .get(&key.to_ascii_lowercase())
            .map(|s| s.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body decoded as text, invalid UTF-8 replaced
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
