//! HTML to PDF conversion over a browser control session.
//!
//! A conversion opens one session, loads `about:blank`, replaces the root
//! frame's document with the caller's HTML, waits for the load event and
//! prints the page. The session is closed before the call returns, whatever
//! the outcome.

use crate::context::{Context, Done};
use crate::error::{Error, Phase, Result};
use crate::logging::{diag, Logger};
use crate::options::{ConvertOptions, ResolvedOptions};
use crate::transport::{BrowserOptions, ChromiumTransport, Session, Transport, TransportError};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::instrument;

/// Page every conversion starts from.
pub const BLANK_PAGE: &str = "about:blank";

/// Leading bytes of every PDF document.
pub const PDF_MAGIC: &[u8] = b"%PDF";

/// Upper bound on session teardown, which is not subject to the caller's context.
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Converts HTML to PDF through a [`Transport`].
///
/// Converters hold no per-call state and can be shared across tasks; every
/// call opens and closes its own session.
#[derive(Debug, Clone)]
pub struct Converter<T = ChromiumTransport> {
    transport: T,
    defaults: ConvertOptions,
}

impl Converter<ChromiumTransport> {
    /// A converter launching Chrome with `browser` for each conversion.
    pub fn new(browser: BrowserOptions) -> Self {
        Self::with_transport(ChromiumTransport::new(browser))
    }
}

impl Default for Converter<ChromiumTransport> {
    fn default() -> Self {
        Self::new(BrowserOptions::default())
    }
}

impl<T: Transport> Converter<T> {
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport,
            defaults: ConvertOptions::default(),
        }
    }

    /// Options applied to every call before the call's own options.
    pub fn with_defaults(mut self, defaults: ConvertOptions) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn defaults(&self) -> &ConvertOptions {
        &self.defaults
    }

    /// Reads `path` as UTF-8 and converts its contents.
    ///
    /// A missing file yields [`Error::FileNotFound`]; any other read failure
    /// yields [`Error::Io`].
    pub async fn convert_file(
        &self,
        ctx: &Context,
        path: impl AsRef<Path>,
        options: ConvertOptions,
    ) -> Result<Vec<u8>> {
        let html = read_html(path.as_ref()).await?;
        self.convert_content(ctx, &html, options).await
    }

    /// Converts `html` to PDF bytes.
    ///
    /// Empty input is valid and produces a blank page. The returned bytes
    /// always start with `%PDF`.
    #[instrument(skip_all, fields(html_bytes = html.len()))]
    pub async fn convert_content(
        &self,
        ctx: &Context,
        html: &str,
        options: ConvertOptions,
    ) -> Result<Vec<u8>> {
        let options = options.resolve_over(&self.defaults);
        let ctx = match options.timeout {
            Some(timeout) => ctx.child_with_timeout(timeout),
            None => ctx.clone(),
        };
        let logger = &options.logger;

        if let Some(done) = ctx.err() {
            diag!(logger, "context already done ({done:?}); not opening a session");
            return Err(cancelled(done, Phase::Setup));
        }

        let started = Instant::now();
        let session = ctx
            .run(self.transport.open(logger))
            .await
            .map_err(|done| cancelled(done, Phase::Setup))?
            .map_err(protocol(Phase::Setup, "open session"))?;

        let result = drive(&session, &ctx, html, &options).await;
        release(session, logger).await;

        match &result {
            Ok(pdf) => diag!(
                logger,
                "converted {} bytes of HTML into {} bytes of PDF in {:?}",
                html.len(),
                pdf.len(),
                started.elapsed()
            ),
            Err(err) => diag!(logger, "conversion failed: {err}"),
        }
        result
    }
}

/// Runs the command sequence on an open session.
async fn drive<S: Session>(
    session: &S,
    ctx: &Context,
    html: &str,
    options: &ResolvedOptions,
) -> Result<Vec<u8>> {
    step(ctx, Phase::Setup, "navigate to blank page", session.navigate(BLANK_PAGE)).await?;

    // The observer must be live before the content is set, or the load event
    // can fire before anyone listens for it.
    let load = step(
        ctx,
        Phase::Injection,
        "subscribe to load event",
        session.subscribe_load(),
    )
    .await?;
    let frame = step(ctx, Phase::Injection, "get frame tree", session.root_frame()).await?;
    diag!(options.logger, "injecting {} bytes into frame {frame}", html.len());

    let inject = async {
        session
            .set_document_content(&frame, html)
            .await
            .map_err(protocol(Phase::Injection, "set document content"))
    };
    let loaded = async {
        load.await
            .map_err(protocol(Phase::Injection, "wait for load event"))
    };
    ctx.run(async { tokio::try_join!(inject, loaded) })
        .await
        .map_err(|done| cancelled(done, Phase::Injection))??;

    let pdf = step(
        ctx,
        Phase::Extraction,
        "print to pdf",
        session.print_to_pdf(&options.print),
    )
    .await?;
    validate_pdf(pdf)
}

/// Races one transport command against the context.
async fn step<F, O>(ctx: &Context, phase: Phase, name: &'static str, command: F) -> Result<O>
where
    F: std::future::Future<Output = std::result::Result<O, TransportError>>,
{
    ctx.run(command)
        .await
        .map_err(|done| cancelled(done, phase))?
        .map_err(protocol(phase, name))
}

/// Closes the session within [`CLOSE_TIMEOUT`]. Failures are logged, not returned.
async fn release<S: Session>(session: S, logger: &Logger) {
    match tokio::time::timeout(CLOSE_TIMEOUT, session.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => diag!(logger, "failed to close browser session: {err}"),
        Err(_) => diag!(
            logger,
            "browser session did not close within {CLOSE_TIMEOUT:?}; dropping it"
        ),
    }
}

fn validate_pdf(pdf: Vec<u8>) -> Result<Vec<u8>> {
    if !pdf.starts_with(PDF_MAGIC) {
        return Err(Error::protocol(
            Phase::Extraction,
            "print to pdf",
            format!("browser returned {} bytes without a %PDF header", pdf.len()),
        ));
    }
    Ok(pdf)
}

fn cancelled(done: Done, phase: Phase) -> Error {
    match done {
        Done::Cancelled => Error::Cancelled { phase },
        Done::DeadlineExceeded => Error::DeadlineExceeded { phase },
    }
}

fn protocol(phase: Phase, step: &'static str) -> impl FnOnce(TransportError) -> Error {
    move |err| Error::protocol(phase, step, err.message())
}

async fn read_html(path: &Path) -> Result<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(html) => Ok(html),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            Err(Error::FileNotFound(path.to_path_buf()))
        }
        Err(err) => Err(Error::io(path, err)),
    }
}

/// Converts `html` with a default Chrome-backed [`Converter`].
pub async fn convert_html_to_pdf(
    ctx: &Context,
    html: &str,
    options: ConvertOptions,
) -> Result<Vec<u8>> {
    Converter::default().convert_content(ctx, html, options).await
}

/// Reads the HTML file at `path` and converts it with a default Chrome-backed [`Converter`].
pub async fn convert_html_file_to_pdf(
    ctx: &Context,
    path: impl AsRef<Path>,
    options: ConvertOptions,
) -> Result<Vec<u8>> {
    Converter::default().convert_file(ctx, path, options).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{PdfOptions, PrintSettings};
    use crate::transport::{MockBehavior, MockStep, MockTransport};
    use std::sync::{Arc, Mutex};

    fn converter(behavior: MockBehavior) -> (Converter<MockTransport>, MockTransport) {
        let mock = MockTransport::with_behavior(behavior);
        (Converter::with_transport(mock.clone()), mock)
    }

    fn fail_at(step: MockStep) -> MockBehavior {
        MockBehavior {
            fail_at: Some(step),
            ..MockBehavior::default()
        }
    }

    #[tokio::test]
    async fn converts_simple_html() {
        let (converter, mock) = converter(MockBehavior::default());
        let pdf = converter
            .convert_content(
                &Context::background(),
                "<html><body><h1>Hello World</h1></body></html>",
                ConvertOptions::new(),
            )
            .await
            .expect("conversion succeeds");

        assert!(pdf.starts_with(PDF_MAGIC));
        assert_eq!(mock.opened(), 1);
        assert_eq!(mock.closed(), 1);
    }

    #[tokio::test]
    async fn empty_html_produces_pdf() {
        let (converter, _) = converter(MockBehavior::default());
        let pdf = converter
            .convert_content(&Context::background(), "", ConvertOptions::new())
            .await
            .expect("empty input is valid");
        assert!(pdf.starts_with(PDF_MAGIC));
    }

    #[tokio::test]
    async fn commands_are_issued_in_order_with_observer_first() {
        let (converter, mock) = converter(MockBehavior::default());
        converter
            .convert_content(&Context::background(), "<p>x</p>", ConvertOptions::new())
            .await
            .unwrap();

        assert_eq!(
            mock.steps_for(0),
            vec![
                MockStep::Open,
                MockStep::Navigate,
                MockStep::SubscribeLoad,
                MockStep::RootFrame,
                MockStep::SetContent,
                MockStep::Print,
                MockStep::Close,
            ]
        );
    }

    #[tokio::test]
    async fn background_printing_is_off_by_default() {
        let (converter, mock) = converter(MockBehavior::default());
        converter
            .convert_content(&Context::background(), "<p/>", ConvertOptions::new())
            .await
            .unwrap();
        assert_eq!(mock.printed(), vec![PrintSettings::default()]);
        assert!(!mock.printed()[0].print_background);
    }

    #[tokio::test]
    async fn print_settings_follow_defaults_then_call_options() {
        let mock = MockTransport::new();
        let converter = Converter::with_transport(mock.clone()).with_defaults(
            ConvertOptions::new().pdf(PdfOptions {
                landscape: Some(true),
                ..PdfOptions::default()
            }),
        );
        converter
            .convert_content(
                &Context::background(),
                "<p/>",
                ConvertOptions::new().print_background(true),
            )
            .await
            .unwrap();

        let printed = &mock.printed()[0];
        assert!(printed.print_background);
        assert_eq!(printed.layout.landscape, Some(true));
    }

    #[tokio::test]
    async fn already_cancelled_context_never_opens_session() {
        let (converter, mock) = converter(MockBehavior::default());
        let ctx = Context::background();
        ctx.cancel();

        let err = converter
            .convert_content(&ctx, "<p/>", ConvertOptions::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled { phase: Phase::Setup }));
        assert!(mock.journal().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_during_session_open_is_setup_failure() {
        let (converter, mock) = converter(MockBehavior {
            open_delay: Some(Duration::from_secs(10)),
            ..MockBehavior::default()
        });
        let ctx = Context::with_timeout(Duration::from_secs(1));

        let err = converter
            .convert_content(&ctx, "<p/>", ConvertOptions::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::DeadlineExceeded {
                phase: Phase::Setup
            }
        ));
        assert_eq!(mock.opened(), 0);
        assert_eq!(mock.closed(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_session_open_is_setup_failure() {
        let (converter, mock) = converter(MockBehavior {
            open_delay: Some(Duration::from_secs(10)),
            ..MockBehavior::default()
        });
        let ctx = Context::background();
        let remote = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            remote.cancel();
        });

        let err = converter
            .convert_content(&ctx, "<p/>", ConvertOptions::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled { phase: Phase::Setup }));
        assert_eq!(mock.opened(), 0);
        assert_eq!(mock.closed(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_deadline_is_classified_as_cancellation() {
        let (converter, mock) = converter(MockBehavior::default());
        let ctx = Context::with_timeout(Duration::from_millis(1));
        tokio::time::advance(Duration::from_millis(10)).await;

        let err = converter
            .convert_content(&ctx, "<p/>", ConvertOptions::new())
            .await
            .unwrap_err();

        assert!(err.is_cancellation());
        assert!(matches!(err, Error::DeadlineExceeded { .. }));
        assert_eq!(mock.opened(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_unblocks_load_wait_and_closes_session() {
        let (converter, mock) = converter(MockBehavior {
            suppress_load: true,
            ..MockBehavior::default()
        });
        let ctx = Context::with_timeout(Duration::from_secs(5));

        let err = converter
            .convert_content(&ctx, "<p/>", ConvertOptions::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::DeadlineExceeded {
                phase: Phase::Injection
            }
        ));
        assert_eq!(mock.opened(), 1);
        assert_eq!(mock.closed(), 1);
        assert!(!mock.steps_for(0).contains(&MockStep::Print));
    }

    #[tokio::test]
    async fn cancel_mid_wait_returns_cancelled_and_closes_session() {
        let (converter, mock) = converter(MockBehavior {
            suppress_load: true,
            ..MockBehavior::default()
        });
        let ctx = Context::background();
        let remote = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            remote.cancel();
        });

        let err = converter
            .convert_content(&ctx, "<p/>", ConvertOptions::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Cancelled {
                phase: Phase::Injection
            }
        ));
        assert_eq!(mock.closed(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn per_call_timeout_bounds_background_context() {
        let (converter, mock) = converter(MockBehavior {
            suppress_load: true,
            ..MockBehavior::default()
        });

        let err = converter
            .convert_content(
                &Context::background(),
                "<p/>",
                ConvertOptions::new().timeout(Duration::from_secs(1)),
            )
            .await
            .unwrap_err();

        assert!(err.is_cancellation());
        assert_eq!(mock.closed(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_load_event_is_awaited() {
        let (converter, _) = converter(MockBehavior {
            load_delay: Some(Duration::from_millis(500)),
            ..MockBehavior::default()
        });
        let pdf = converter
            .convert_content(
                &Context::with_timeout(Duration::from_secs(5)),
                "<p>late</p>",
                ConvertOptions::new(),
            )
            .await
            .unwrap();
        assert!(String::from_utf8_lossy(&pdf).contains("<p>late</p>"));
    }

    #[tokio::test]
    async fn failures_carry_their_phase_and_release_session() {
        let cases = [
            (MockStep::Navigate, Phase::Setup, "navigate to blank page"),
            (MockStep::SubscribeLoad, Phase::Injection, "subscribe to load event"),
            (MockStep::RootFrame, Phase::Injection, "get frame tree"),
            (MockStep::SetContent, Phase::Injection, "set document content"),
            (MockStep::Print, Phase::Extraction, "print to pdf"),
        ];

        for (failing, expected_phase, expected_step) in cases {
            let (converter, mock) = converter(fail_at(failing));
            let err = converter
                .convert_content(&Context::background(), "<p/>", ConvertOptions::new())
                .await
                .unwrap_err();

            match err {
                Error::Protocol { phase, step, .. } => {
                    assert_eq!(phase, expected_phase, "phase for {failing:?}");
                    assert_eq!(step, expected_step, "step for {failing:?}");
                }
                other => panic!("expected protocol error for {failing:?}, got {other:?}"),
            }
            assert_eq!(mock.closed(), 1, "session closed after {failing:?}");
        }
    }

    #[tokio::test]
    async fn open_failure_is_setup_error_without_close() {
        let (converter, mock) = converter(fail_at(MockStep::Open));
        let err = converter
            .convert_content(&Context::background(), "<p/>", ConvertOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err.phase(), Some(Phase::Setup));
        assert_eq!(mock.closed(), 0);
    }

    #[tokio::test]
    async fn close_failure_after_success_keeps_pdf() {
        let (converter, mock) = converter(fail_at(MockStep::Close));
        let pdf = converter
            .convert_content(&Context::background(), "<p/>", ConvertOptions::new())
            .await
            .expect("teardown failures do not discard the document");
        assert!(pdf.starts_with(PDF_MAGIC));
        assert_eq!(mock.closed(), 1);
    }

    #[tokio::test]
    async fn non_pdf_output_is_rejected() {
        let (converter, _) = converter(MockBehavior {
            raw_output: Some(b"<html>not a pdf</html>".to_vec()),
            ..MockBehavior::default()
        });
        let err = converter
            .convert_content(&Context::background(), "<p/>", ConvertOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err.phase(), Some(Phase::Extraction));
    }

    #[tokio::test]
    async fn custom_logger_receives_session_diagnostics() {
        let lines = Arc::new(Mutex::new(Vec::<String>::new()));
        let sink = Arc::clone(&lines);
        let (converter, _) = converter(MockBehavior::default());

        converter
            .convert_content(
                &Context::background(),
                "<p/>",
                ConvertOptions::new().with_logger(move |args| sink.lock().unwrap().push(args.to_string())),
            )
            .await
            .unwrap();

        let lines = lines.lock().unwrap();
        assert!(lines.iter().any(|l| l.contains("mock session 0 opened")));
        assert!(lines.iter().any(|l| l.contains("converted")));
    }

    #[tokio::test]
    async fn silent_logger_still_converts() {
        let (converter, _) = converter(MockBehavior::default());
        let pdf = converter
            .convert_content(
                &Context::background(),
                "<p/>",
                ConvertOptions::new().without_logger(),
            )
            .await
            .unwrap();
        assert!(pdf.starts_with(PDF_MAGIC));
    }

    #[tokio::test]
    async fn concurrent_calls_keep_their_own_content() {
        let (converter, mock) = converter(MockBehavior {
            load_delay: Some(Duration::from_millis(5)),
            ..MockBehavior::default()
        });
        let converter = Arc::new(converter);

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let converter = Arc::clone(&converter);
                tokio::spawn(async move {
                    let html = format!("<p>document-{i}</p>");
                    let pdf = converter
                        .convert_content(&Context::background(), &html, ConvertOptions::new())
                        .await
                        .unwrap();
                    (html, pdf)
                })
            })
            .collect();

        for task in tasks {
            let (html, pdf) = task.await.unwrap();
            let text = String::from_utf8(pdf).unwrap();
            assert!(text.contains(&html), "output for {html} contains its own input");
            assert_eq!(text.matches("document-").count(), 1);
        }
        assert_eq!(mock.opened(), 8);
        assert_eq!(mock.closed(), 8);
    }

    #[tokio::test]
    async fn repeated_calls_each_produce_valid_pdf() {
        let (converter, mock) = converter(MockBehavior::default());
        let ctx = Context::background();
        let first = converter
            .convert_content(&ctx, "<h1>same</h1>", ConvertOptions::new())
            .await
            .unwrap();
        let second = converter
            .convert_content(&ctx, "<h1>same</h1>", ConvertOptions::new())
            .await
            .unwrap();

        assert!(first.starts_with(PDF_MAGIC) && second.starts_with(PDF_MAGIC));
        assert_eq!(mock.opened(), 2);
        assert_eq!(mock.closed(), 2);
    }

    #[tokio::test]
    async fn read_html_classifies_missing_file() {
        let err = read_html(Path::new("non-existent-file.html"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
