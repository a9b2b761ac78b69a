//! Per-call conversion options.
//!
//! [`ConvertOptions`] holds *overrides*: every field is optional and unset
//! fields fall through to the defaults they are merged over. Resolution is a
//! pure function ([`ConvertOptions::resolve_over`]) so converters can keep a
//! set of defaults and layer each call's options on top.

use crate::logging::Logger;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Page layout forwarded to the browser's print-to-PDF command.
///
/// `None` leaves the browser's own default in place. Lengths are in inches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PdfOptions {
    pub landscape: Option<bool>,
    pub scale: Option<f64>,
    pub paper_width: Option<f64>,
    pub paper_height: Option<f64>,
    pub margin_top: Option<f64>,
    pub margin_bottom: Option<f64>,
    pub margin_left: Option<f64>,
    pub margin_right: Option<f64>,
    pub prefer_css_page_size: Option<bool>,
    /// Pages to print, e.g. `"1-5, 8"`.
    pub page_ranges: Option<String>,
}

impl PdfOptions {
    /// Field-wise overlay: values set in `overrides` win.
    pub fn merged_with(&self, overrides: &PdfOptions) -> PdfOptions {
        PdfOptions {
            landscape: overrides.landscape.or(self.landscape),
            scale: overrides.scale.or(self.scale),
            paper_width: overrides.paper_width.or(self.paper_width),
            paper_height: overrides.paper_height.or(self.paper_height),
            margin_top: overrides.margin_top.or(self.margin_top),
            margin_bottom: overrides.margin_bottom.or(self.margin_bottom),
            margin_left: overrides.margin_left.or(self.margin_left),
            margin_right: overrides.margin_right.or(self.margin_right),
            prefer_css_page_size: overrides.prefer_css_page_size.or(self.prefer_css_page_size),
            page_ranges: overrides
                .page_ranges
                .clone()
                .or_else(|| self.page_ranges.clone()),
        }
    }
}

/// Everything the print step needs once options are resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrintSettings {
    /// Print CSS background colors and images. Off unless asked for.
    pub print_background: bool,
    pub layout: PdfOptions,
}

/// Optional overrides for a single conversion.
///
/// # Example
///
/// ```
/// use html2pdf_lib::ConvertOptions;
/// use std::time::Duration;
///
/// let opts = ConvertOptions::new()
///     .with_logger(|args| eprintln!("cdp: {args}"))
///     .print_background(true)
///     .timeout(Duration::from_secs(30));
/// # let _ = opts;
/// ```
#[derive(Clone, Default)]
pub struct ConvertOptions {
    pub logger: Option<Logger>,
    pub print_background: Option<bool>,
    pub pdf: Option<PdfOptions>,
    pub timeout: Option<Duration>,
}

impl ConvertOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes session diagnostics to `sink`.
    pub fn with_logger<F>(mut self, sink: F) -> Self
    where
        F: Fn(fmt::Arguments<'_>) + Send + Sync + 'static,
    {
        self.logger = Some(Logger::custom(sink));
        self
    }

    /// Disables all diagnostic output for the call.
    pub fn without_logger(mut self) -> Self {
        self.logger = Some(Logger::Silent);
        self
    }

    pub fn logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn print_background(mut self, enabled: bool) -> Self {
        self.print_background = Some(enabled);
        self
    }

    pub fn pdf(mut self, pdf: PdfOptions) -> Self {
        self.pdf = Some(pdf);
        self
    }

    /// Budget for the whole call, combined with the caller's context by
    /// taking the earlier deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Layers `self` over `defaults`; set fields in `self` win.
    pub fn overlay(&self, defaults: &ConvertOptions) -> ConvertOptions {
        let pdf = match (&defaults.pdf, &self.pdf) {
            (Some(base), Some(over)) => Some(base.merged_with(over)),
            (base, over) => over.clone().or_else(|| base.clone()),
        };
        ConvertOptions {
            logger: self.logger.clone().or_else(|| defaults.logger.clone()),
            print_background: self.print_background.or(defaults.print_background),
            pdf,
            timeout: self.timeout.or(defaults.timeout),
        }
    }

    /// Applies built-in defaults, then `defaults`, then `self`.
    pub fn resolve_over(&self, defaults: &ConvertOptions) -> ResolvedOptions {
        let merged = self.overlay(defaults);
        ResolvedOptions {
            logger: merged.logger.unwrap_or_default(),
            print: PrintSettings {
                print_background: merged.print_background.unwrap_or(false),
                layout: merged.pdf.unwrap_or_default(),
            },
            timeout: merged.timeout,
        }
    }
}

impl fmt::Debug for ConvertOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConvertOptions")
            .field("logger", &self.logger)
            .field("print_background", &self.print_background)
            .field("pdf", &self.pdf)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Options after merging, with every default filled in.
#[derive(Debug, Clone)]
pub struct ResolvedOptions {
    pub logger: Logger,
    pub print: PrintSettings,
    pub timeout: Option<Duration>,
}
