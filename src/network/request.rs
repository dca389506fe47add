//! HTTP request descriptions handed to the transport

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use url::Url;

use crate::utils::{BrowserError, Result};

/// Immutable snapshot of an outgoing body.
///
/// Cloning only bumps a reference count, so every retry of a request
/// re-submits byte-identical content from the same buffer.
pub type Payload = Bytes;

/// HTTP operations the transport can issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Head,
    Get,
    Put,
    Post,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Head => "HEAD",
            Operation::Get => "GET",
            Operation::Put => "PUT",
            Operation::Post => "POST",
            Operation::Delete => "DELETE",
        }
    }

    /// Whether requests of this kind upload a body
    pub fn carries_body(&self) -> bool {
        matches!(self, Operation::Put | Operation::Post)
    }
}

impl FromStr for Operation {
    type Err = BrowserError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "head" => Ok(Self::Head),
            "get" => Ok(Self::Get),
            "put" => Ok(Self::Put),
            "post" => Ok(Self::Post),
            "delete" => Ok(Self::Delete),
            _ => Err(BrowserError::UnsupportedMethod(s.to_string())),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target URL plus the raw headers set by the driver
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    url: Url,
    headers: HashMap<String, String>,
}

impl PageRequest {
    /// Create a new request
    pub fn new(url: &str) -> Result<Self> {
        let parsed = Url::parse(url).map_err(|_| BrowserError::InvalidUrl(url.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(BrowserError::InvalidUrl(url.to_string()));
        }
        Ok(Self {
            url: parsed,
            headers: HashMap::new(),
        })
    }

    /// Add a header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Add every header of a driver-supplied mapping
    pub fn with_headers<K, V>(mut self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }
}

/// Urlencode driver form fields into a request body
pub fn form_body<I, K, V>(fields: I) -> Payload
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (name, value) in fields {
        serializer.append_pair(name.as_ref(), value.as_ref());
    }
    Bytes::from(serializer.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_parsing() {
        assert_eq!("post".parse::<Operation>().unwrap(), Operation::Post);
        assert_eq!("GET".parse::<Operation>().unwrap(), Operation::Get);
        assert_eq!("Delete".parse::<Operation>().unwrap(), Operation::Delete);
        assert!(matches!(
            "patch".parse::<Operation>(),
            Err(BrowserError::UnsupportedMethod(_))
        ));
    }

    #[test]
    fn test_operation_body() {
        assert!(Operation::Post.carries_body());
        assert!(Operation::Put.carries_body());
        assert!(!Operation::Get.carries_body());
        assert!(!Operation::Head.carries_body());
    }

    #[test]
    fn test_request_builder() {
        let req = PageRequest::new("http://127.0.0.1:8088")
            .unwrap()
            .header("Accept", "text/html")
            .with_headers([("X-Step", "1")]);

        assert_eq!(req.url().as_str(), "http://127.0.0.1:8088/");
        assert_eq!(req.headers().get("Accept"), Some(&"text/html".to_string()));
        assert_eq!(req.headers().get("X-Step"), Some(&"1".to_string()));
    }

    #[test]
    fn test_request_rejects_other_schemes() {
        assert!(PageRequest::new("ftp://example.com").is_err());
        assert!(PageRequest::new("not a url").is_err());
    }

    #[test]
    fn test_form_body() {
        let body = form_body([("test", "1"), ("q", "a b&c")]);
        assert_eq!(&body[..], b"test=1&q=a+b%26c");
    }
}
