//! html2pdf Library
//!
//! Converts HTML content or files into PDF documents by driving a locally
//! installed Chrome/Chromium over the DevTools Protocol. The browser does all
//! of the rendering; this crate opens a blank page, sets its document content
//! directly, waits for the load event and asks the browser to print.
//!
//! # Module Overview
//!
//! - [`converter`] - The conversion sequence and the file/content entry points
//! - [`context`] - Cancellation token plus deadline threaded through every step
//! - [`options`] - Per-call overrides and their merge with defaults
//! - [`logging`] - Diagnostic sink for browser sessions
//! - [`transport`] - The DevTools command set, backed by chromiumoxide or a mock
//! - [`config`] - TOML configuration file support
//! - [`output`] - JSON output schemas
//!
//! # Example
//!
//! ```no_run
//! use html2pdf_lib::{convert_html_to_pdf, ConvertOptions, Context};
//! use std::time::Duration;
//!
//! # async fn example() -> html2pdf_lib::Result<()> {
//! let ctx = Context::with_timeout(Duration::from_secs(30));
//! let pdf = convert_html_to_pdf(
//!     &ctx,
//!     "<html><body><h1>Hello World</h1></body></html>",
//!     ConvertOptions::new().without_logger(),
//! )
//! .await?;
//! assert!(pdf.starts_with(b"%PDF"));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod converter;
pub mod error;
pub mod logging;
pub mod options;
pub mod output;
pub mod transport;

pub use config::Config;
pub use context::{Context, Done};
pub use converter::{convert_html_file_to_pdf, convert_html_to_pdf, Converter, PDF_MAGIC};
pub use error::{Error, ErrorCategory, ErrorPayload, Phase, Result};
pub use logging::Logger;
pub use options::{ConvertOptions, PdfOptions, PrintSettings, ResolvedOptions};
pub use output::{
    ConvertOutput, ErrorOutput, Html2PdfOutput, InputDescriptor, InputKind, OUTPUT_VERSION,
};
pub use transport::{BrowserOptions, ChromiumTransport, MockTransport};
