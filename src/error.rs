use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Stage of a conversion a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// Acquiring the browser session and loading the blank baseline.
    Setup,
    /// Registering the load observer, setting document content, waiting for load.
    Injection,
    /// Printing the loaded document to PDF.
    Extraction,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Setup => f.write_str("session setup"),
            Phase::Injection => f.write_str("content injection"),
            Phase::Extraction => f.write_str("PDF extraction"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("html file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("failed to read file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to convert HTML to PDF during {phase} ({step}): {message}")]
    Protocol {
        phase: Phase,
        step: &'static str,
        message: String,
    },

    #[error("conversion cancelled during {phase}")]
    Cancelled { phase: Phase },

    #[error("conversion deadline exceeded during {phase}")]
    DeadlineExceeded { phase: Phase },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn protocol(phase: Phase, step: &'static str, message: impl Into<String>) -> Self {
        Error::Protocol {
            phase,
            step,
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// `true` for [`Error::FileNotFound`] only; other read failures are [`Error::Io`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::FileNotFound(_))
    }

    /// `true` when the caller's context was cancelled or ran out of time.
    ///
    /// Callers can use this to tell a budget problem (retry with a longer
    /// deadline) apart from a browser or protocol failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            Error::Cancelled { .. } | Error::DeadlineExceeded { .. }
        )
    }

    /// The conversion phase a browser-side failure happened in.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Error::Protocol { phase, .. }
            | Error::Cancelled { phase }
            | Error::DeadlineExceeded { phase } => Some(*phase),
            _ => None,
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        match self {
            Error::FileNotFound(_) => ErrorPayload::new(
                ErrorCategory::NotFound,
                self.to_string(),
                "Verify the input path exists; use an absolute path or run from the working directory.",
            ),
            Error::Io { .. } => ErrorPayload::new(
                ErrorCategory::Io,
                self.to_string(),
                "Check file permissions and that the input is a UTF-8 encoded HTML file.",
            ),
            Error::Protocol {
                phase: Phase::Setup,
                message,
                ..
            } if message.to_ascii_lowercase().contains("executable") => ErrorPayload::new(
                ErrorCategory::Browser,
                self.to_string(),
                "Install Chrome/Chromium or point --chrome (or browser.executable in the config) at the binary.",
            ),
            Error::Protocol { .. } => ErrorPayload::new(
                ErrorCategory::Browser,
                self.to_string(),
                "Re-run with --verbose to see the DevTools session log.",
            ),
            Error::Cancelled { .. } => ErrorPayload::new(
                ErrorCategory::Cancelled,
                self.to_string(),
                "The conversion was interrupted; re-run it to completion.",
            ),
            Error::DeadlineExceeded { .. } => ErrorPayload::new(
                ErrorCategory::Timeout,
                self.to_string(),
                "Increase --timeout (or timeout in the config) and ensure the page finishes loading.",
            ),
            Error::Config(_) => ErrorPayload::new(
                ErrorCategory::Config,
                self.to_string(),
                "Check the config file syntax and values (e.g., timeout = \"30s\").",
            ),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCategory {
    NotFound,
    Io,
    Browser,
    Cancelled,
    Timeout,
    Config,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub category: ErrorCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl ErrorPayload {
    pub fn new(category: ErrorCategory, message: String, remediation: impl Into<String>) -> Self {
        Self {
            category,
            message,
            remediation: Some(remediation.into()),
        }
    }
}
