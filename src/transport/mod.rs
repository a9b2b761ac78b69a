//! Browser control transport.
//!
//! The converter only needs a handful of DevTools commands. They are expressed
//! here as two traits so the orchestration can run against real Chrome
//! ([`ChromiumTransport`]) or an in-memory stand-in ([`MockTransport`]).
//!
//! # Module Structure
//!
//! - [`chromium`] - chromiumoxide-backed sessions, one browser process each
//! - [`mock`] - deterministic in-memory sessions with failure injection

pub mod chromium;
pub mod mock;

use crate::logging::Logger;
use crate::options::PrintSettings;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt;
use thiserror::Error;

pub use chromium::{BrowserOptions, ChromiumTransport};
pub use mock::{MockBehavior, MockStep, MockTransport};

/// Identifier of a frame in the page's frame tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FrameId(String);

impl FrameId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A registered observer for the page's load-complete event.
///
/// The observer is live from the moment [`Session::subscribe_load`] returns,
/// so events fired after that point are never missed. Awaiting it resolves on
/// the first load event.
pub type LoadSignal = BoxFuture<'static, Result<(), TransportError>>;

/// Failure reported by a transport command.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Factory for browser sessions.
#[async_trait]
pub trait Transport: Send + Sync {
    type Session: Session;

    /// Opens a fresh session. Its diagnostics are written to `logger`.
    async fn open(&self, logger: &Logger) -> Result<Self::Session, TransportError>;
}

/// One live control connection to a page.
///
/// A session is driven by a single conversion at a time. Dropping a session
/// without calling [`close`](Session::close) must still release the browser.
#[async_trait]
pub trait Session: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), TransportError>;

    async fn subscribe_load(&self) -> Result<LoadSignal, TransportError>;

    async fn root_frame(&self) -> Result<FrameId, TransportError>;

    async fn set_document_content(&self, frame: &FrameId, html: &str) -> Result<(), TransportError>;

    async fn print_to_pdf(&self, settings: &PrintSettings) -> Result<Vec<u8>, TransportError>;

    async fn close(self) -> Result<(), TransportError>;
}
