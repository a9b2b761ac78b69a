//! In-memory transport for testing.

use super::{FrameId, LoadSignal, Session, Transport, TransportError};
use crate::logging::{diag, Logger};
use crate::options::PrintSettings;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

/// A transport command, as recorded in the [`MockTransport`] journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockStep {
    Open,
    Navigate,
    SubscribeLoad,
    RootFrame,
    SetContent,
    Print,
    Close,
}

/// Knobs controlling how mock sessions behave.
#[derive(Debug, Clone, Default)]
pub struct MockBehavior {
    /// Command that reports a failure instead of succeeding.
    pub fail_at: Option<MockStep>,
    /// Delay before a session is handed out.
    pub open_delay: Option<Duration>,
    /// Delay between setting content and firing the load event.
    pub load_delay: Option<Duration>,
    /// Never fire the load event.
    pub suppress_load: bool,
    /// Bytes returned by print instead of the generated document.
    pub raw_output: Option<Vec<u8>>,
}

#[derive(Debug, Default)]
struct Shared {
    next_id: AtomicUsize,
    opened: AtomicUsize,
    closed: AtomicUsize,
    journal: Mutex<Vec<(usize, MockStep)>>,
    printed: Mutex<Vec<PrintSettings>>,
}

/// Deterministic stand-in for a browser.
///
/// Each session keeps the document set through
/// [`Session::set_document_content`] and "prints" it into a tiny `%PDF`
/// document that embeds the HTML verbatim, so tests can check which content
/// ended up in which output. Clones share counters and the journal.
///
/// # Examples
///
/// ```
/// use html2pdf_lib::transport::{MockStep, MockTransport};
/// use html2pdf_lib::{ConvertOptions, Context, Converter};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> html2pdf_lib::Result<()> {
/// let mock = MockTransport::new();
/// let converter = Converter::with_transport(mock.clone());
/// let pdf = converter
///     .convert_content(&Context::background(), "<h1>Hi</h1>", ConvertOptions::new())
///     .await?;
/// assert!(pdf.starts_with(b"%PDF"));
/// assert_eq!(mock.opened(), mock.closed());
/// assert_eq!(mock.steps_for(0).last(), Some(&MockStep::Close));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    behavior: MockBehavior,
    shared: Arc<Shared>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_behavior(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            shared: Arc::default(),
        }
    }

    /// Sessions successfully handed out.
    pub fn opened(&self) -> usize {
        self.shared.opened.load(Ordering::SeqCst)
    }

    /// Sessions on which `close` was called.
    pub fn closed(&self) -> usize {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Every command issued, tagged with the session id (ids start at 0).
    pub fn journal(&self) -> Vec<(usize, MockStep)> {
        lock(&self.shared.journal).clone()
    }

    pub fn steps_for(&self, session: usize) -> Vec<MockStep> {
        lock(&self.shared.journal)
            .iter()
            .filter(|(id, _)| *id == session)
            .map(|(_, step)| *step)
            .collect()
    }

    /// Settings passed to each print command, in order.
    pub fn printed(&self) -> Vec<PrintSettings> {
        lock(&self.shared.printed).clone()
    }

    fn record(&self, session: usize, step: MockStep) {
        lock(&self.shared.journal).push((session, step));
    }
}

// A panic while holding one of these locks only happens in a failing test.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn check(behavior: &MockBehavior, step: MockStep) -> Result<(), TransportError> {
    if behavior.fail_at == Some(step) {
        return Err(TransportError::new(format!("mock failure at {step:?}")));
    }
    Ok(())
}

#[async_trait]
impl Transport for MockTransport {
    type Session = MockSession;

    async fn open(&self, logger: &Logger) -> Result<MockSession, TransportError> {
        if let Some(delay) = self.behavior.open_delay {
            tokio::time::sleep(delay).await;
        }
        let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst);
        self.record(id, MockStep::Open);
        check(&self.behavior, MockStep::Open)?;
        self.shared.opened.fetch_add(1, Ordering::SeqCst);
        diag!(logger, "mock session {id} opened");
        Ok(MockSession {
            id,
            transport: self.clone(),
            logger: logger.clone(),
            page: Mutex::default(),
        })
    }
}

#[derive(Debug, Default)]
struct MockPage {
    document: Option<String>,
    load_waiters: Vec<oneshot::Sender<()>>,
}

/// Session handed out by [`MockTransport`].
pub struct MockSession {
    id: usize,
    transport: MockTransport,
    logger: Logger,
    page: Mutex<MockPage>,
}

impl MockSession {
    fn step(&self, step: MockStep) -> Result<(), TransportError> {
        self.transport.record(self.id, step);
        check(&self.transport.behavior, step)
    }

    fn frame_id(&self) -> FrameId {
        FrameId::new(format!("mock-frame-{}", self.id))
    }

    fn fire_load(&self, waiters: Vec<oneshot::Sender<()>>) {
        match self.transport.behavior.load_delay {
            Some(delay) => {
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    for waiter in waiters {
                        let _ = waiter.send(());
                    }
                });
            }
            None => {
                for waiter in waiters {
                    let _ = waiter.send(());
                }
            }
        }
    }

    fn render(document: &str, settings: &PrintSettings) -> Vec<u8> {
        format!(
            "%PDF-1.4\n% mock render (printBackground={})\n{}\n%%EOF\n",
            settings.print_background, document
        )
        .into_bytes()
    }
}

#[async_trait]
impl Session for MockSession {
    async fn navigate(&self, url: &str) -> Result<(), TransportError> {
        self.step(MockStep::Navigate)?;
        diag!(self.logger, "mock navigate {url}");
        lock(&self.page).document = None;
        Ok(())
    }

    async fn subscribe_load(&self) -> Result<LoadSignal, TransportError> {
        self.step(MockStep::SubscribeLoad)?;
        let (tx, rx) = oneshot::channel();
        lock(&self.page).load_waiters.push(tx);
        Ok(Box::pin(async move {
            rx.await
                .map_err(|_| TransportError::new("session closed before load event"))
        }))
    }

    async fn root_frame(&self) -> Result<FrameId, TransportError> {
        self.step(MockStep::RootFrame)?;
        Ok(self.frame_id())
    }

    async fn set_document_content(&self, frame: &FrameId, html: &str) -> Result<(), TransportError> {
        self.step(MockStep::SetContent)?;
        if *frame != self.frame_id() {
            return Err(TransportError::new(format!("no frame with id {frame}")));
        }
        let waiters = {
            let mut page = lock(&self.page);
            page.document = Some(html.to_string());
            if self.transport.behavior.suppress_load {
                // Held until the session closes so waiters stay pending.
                Vec::new()
            } else {
                std::mem::take(&mut page.load_waiters)
            }
        };
        diag!(self.logger, "mock document set ({} bytes)", html.len());
        self.fire_load(waiters);
        Ok(())
    }

    async fn print_to_pdf(&self, settings: &PrintSettings) -> Result<Vec<u8>, TransportError> {
        self.step(MockStep::Print)?;
        lock(&self.transport.shared.printed).push(settings.clone());
        if let Some(raw) = &self.transport.behavior.raw_output {
            return Ok(raw.clone());
        }
        let page = lock(&self.page);
        Ok(Self::render(page.document.as_deref().unwrap_or_default(), settings))
    }

    async fn close(self) -> Result<(), TransportError> {
        self.transport.record(self.id, MockStep::Close);
        self.transport.shared.closed.fetch_add(1, Ordering::SeqCst);
        diag!(self.logger, "mock session {} closed", self.id);
        check(&self.transport.behavior, MockStep::Close)
    }
}
