//! Diagnostic sink for browser sessions.

use std::fmt;
use std::sync::Arc;

/// Callback receiving one formatted diagnostic line.
pub type LogFn = dyn Fn(fmt::Arguments<'_>) + Send + Sync;

/// Where session diagnostics go.
///
/// The default forwards to `tracing` at debug level under the `html2pdf`
/// target. [`Logger::Silent`] drops everything.
#[derive(Clone, Default)]
pub enum Logger {
    #[default]
    Tracing,
    Custom(Arc<LogFn>),
    Silent,
}

impl Logger {
    pub fn custom<F>(sink: F) -> Self
    where
        F: Fn(fmt::Arguments<'_>) + Send + Sync + 'static,
    {
        Logger::Custom(Arc::new(sink))
    }

    pub fn log(&self, args: fmt::Arguments<'_>) {
        match self {
            Logger::Tracing => tracing::debug!(target: "html2pdf", "{}", args),
            Logger::Custom(sink) => sink(args),
            Logger::Silent => {}
        }
    }

    pub fn is_silent(&self) -> bool {
        matches!(self, Logger::Silent)
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Logger::Tracing => f.write_str("Logger::Tracing"),
            Logger::Custom(_) => f.write_str("Logger::Custom(..)"),
            Logger::Silent => f.write_str("Logger::Silent"),
        }
    }
}

/// `diag!(logger, "fmt", args..)` formats lazily into the sink.
macro_rules! diag {
    ($logger:expr, $($arg:tt)+) => {
        $logger.log(format_args!($($arg)+))
    };
}
pub(crate) use diag;
