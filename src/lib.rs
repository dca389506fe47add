//! # Crawlview - Headless Page Loader
//!
//! Loads one page at a time through a rendering engine, re-issuing requests
//! that fail for transient network reasons, enforcing a per-task deadline
//! and waiting for background requests to drain before reporting.
//!
//! ## Architecture
//!
//! The crate is organized into the following core modules:
//!
//! - **browser**: Task coordination, deadline and shutdown over one event loop
//! - **engine**: Rendering engine seam and the built-in document page
//! - **network**: HTTP transport and the retrying request tracker
//! - **config**: Browser configuration
//! - **utils**: Shared utilities and error types
//!
//! ## Example
//!
//! ```no_run
//! use crawlview::{Browser, BrowserConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> crawlview::Result<()> {
//!     let mut browser = Browser::with_http(BrowserConfig::default(), |result, handle| {
//!         println!("{} -> {}", result.url, result.successful);
//!         handle.shutdown(|| {});
//!     })?;
//!     browser.perform("GET", "http://localhost:8080/", Vec::<(String, String)>::new(), None)?;
//!     browser.run().await;
//!     Ok(())
//! }
//! ```

pub mod browser;
pub mod config;
pub mod engine;
pub mod network;
pub mod utils;

// Re-export main types for convenience
pub use browser::{Browser, BrowserHandle, TaskResult};
pub use config::BrowserConfig;
pub use engine::{DocumentPage, EngineSettings, RenderingEngine};
pub use network::{HttpTransport, Operation, PageRequest, Transport, form_body};
pub use utils::error::{BrowserError, NetworkErrorKind, Result};

/// Crawlview version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = "Crawlview";
