//! chromiumoxide-backed transport.
//!
//! Every session launches its own headless Chrome with a private, temporary
//! profile directory. Sessions therefore never share browser state, and
//! concurrent conversions never contend for the same profile lock.

use super::{FrameId, LoadSignal, Session, Transport, TransportError};
use crate::logging::{diag, Logger};
use crate::options::PrintSettings;
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::{
    EventLoadEventFired, FrameId as CdpFrameId, GetFrameTreeParams, PrintToPdfParams,
    SetDocumentContentParams,
};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::instrument::WithSubscriber;
use tracing::subscriber::NoSubscriber;

/// Default timeout for the browser process to expose its DevTools endpoint.
pub const DEFAULT_LAUNCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Default timeout for a single DevTools request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How long to wait for the CDP handler loop to drain after the browser exits.
const HANDLER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Configuration for launching the browser behind each session.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// Chrome/Chromium binary. Auto-detected when `None`.
    pub executable: Option<PathBuf>,
    /// Whether to run in headless mode.
    pub headless: bool,
    /// Keep Chrome's sandbox enabled. Containers running as root usually need `false`.
    pub sandbox: bool,
    /// Browser window size in pixels.
    pub window_size: Option<(u32, u32)>,
    /// Timeout for the browser to start.
    pub launch_timeout: Duration,
    /// Timeout for each DevTools request.
    pub request_timeout: Duration,
    /// Extra command-line switches, e.g. `--disable-gpu`.
    pub args: Vec<String>,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
            sandbox: true,
            window_size: None,
            launch_timeout: DEFAULT_LAUNCH_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            args: Vec::new(),
        }
    }
}

impl BrowserOptions {
    fn to_config(&self, profile: &TempDir) -> Result<BrowserConfig, TransportError> {
        let mut builder = BrowserConfig::builder()
            .user_data_dir(profile.path())
            .launch_timeout(self.launch_timeout)
            .request_timeout(self.request_timeout);
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }
        if !self.headless {
            builder = builder.with_head();
        }
        if !self.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some((width, height)) = self.window_size {
            builder = builder.window_size(width, height);
        }
        for arg in &self.args {
            builder = builder.arg(arg.as_str());
        }
        builder
            .build()
            .map_err(|e| TransportError::new(format!("invalid browser configuration: {e}")))
    }
}

/// Launches a dedicated headless browser per session.
#[derive(Debug, Clone, Default)]
pub struct ChromiumTransport {
    options: BrowserOptions,
}

impl ChromiumTransport {
    pub fn new(options: BrowserOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &BrowserOptions {
        &self.options
    }
}

#[async_trait]
impl Transport for ChromiumTransport {
    type Session = ChromiumSession;

    async fn open(&self, logger: &Logger) -> Result<ChromiumSession, TransportError> {
        let profile = tempfile::Builder::new()
            .prefix("html2pdf-profile-")
            .tempdir()
            .map_err(|e| TransportError::new(format!("failed to create browser profile dir: {e}")))?;
        let config = self.options.to_config(&profile)?;

        diag!(
            logger,
            "launching browser (headless: {}, profile: {})",
            self.options.headless,
            profile.path().display()
        );
        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| TransportError::new(format!("failed to launch browser: {e}")))?;

        let handler_logger = logger.clone();
        let handler_task = spawn_handler(logger, async move {
            while let Some(event) = handler.next().await {
                // Unknown or malformed messages are not fatal to the connection.
                if let Err(err) = event {
                    diag!(handler_logger, "cdp handler error: {err}");
                }
            }
            diag!(handler_logger, "cdp connection closed");
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(err) => {
                // The connection may already be broken, so a graceful close
                // could wait forever.
                let _ = browser.kill().await;
                handler_task.abort();
                return Err(TransportError::new(format!("failed to open page: {err}")));
            }
        };
        diag!(logger, "browser session ready");

        Ok(ChromiumSession {
            page,
            browser: Mutex::new(browser),
            handler_task,
            logger: logger.clone(),
            _profile: profile,
        })
    }
}

/// Spawns the CDP handler loop. chromiumoxide traces from inside it, so a
/// silent session runs it without any subscriber.
fn spawn_handler<F>(logger: &Logger, handler: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if logger.is_silent() {
        tokio::spawn(handler.with_subscriber(NoSubscriber::default()))
    } else {
        tokio::spawn(handler)
    }
}

/// A single page in a dedicated browser process.
///
/// Dropping the session without [`Session::close`] still kills the browser:
/// chromiumoxide reaps the child process when [`Browser`] is dropped.
pub struct ChromiumSession {
    page: Page,
    browser: Mutex<Browser>,
    handler_task: JoinHandle<()>,
    logger: Logger,
    // Dropped after `browser`, once the process no longer uses it.
    _profile: TempDir,
}

fn cdp_error(step: &'static str) -> impl FnOnce(chromiumoxide::error::CdpError) -> TransportError {
    move |err| TransportError::new(format!("{step}: {err}"))
}

#[async_trait]
impl Session for ChromiumSession {
    async fn navigate(&self, url: &str) -> Result<(), TransportError> {
        diag!(self.logger, "cdp -> Page.navigate {url}");
        self.page
            .goto(url)
            .await
            .map_err(cdp_error("Page.navigate"))?;
        Ok(())
    }

    async fn subscribe_load(&self) -> Result<LoadSignal, TransportError> {
        let mut events = self
            .page
            .event_listener::<EventLoadEventFired>()
            .await
            .map_err(cdp_error("subscribe Page.loadEventFired"))?;
        let logger = self.logger.clone();
        Ok(Box::pin(async move {
            match events.next().await {
                Some(_) => {
                    diag!(logger, "cdp <- Page.loadEventFired");
                    Ok(())
                }
                None => Err(TransportError::new(
                    "event stream closed before Page.loadEventFired",
                )),
            }
        }))
    }

    async fn root_frame(&self) -> Result<FrameId, TransportError> {
        diag!(self.logger, "cdp -> Page.getFrameTree");
        let tree = self
            .page
            .execute(GetFrameTreeParams::default())
            .await
            .map_err(cdp_error("Page.getFrameTree"))?;
        Ok(FrameId::new(tree.result.frame_tree.frame.id.inner().clone()))
    }

    async fn set_document_content(&self, frame: &FrameId, html: &str) -> Result<(), TransportError> {
        diag!(
            self.logger,
            "cdp -> Page.setDocumentContent frame={frame} ({} bytes)",
            html.len()
        );
        let params = SetDocumentContentParams::new(CdpFrameId::new(frame.as_str()), html);
        self.page
            .execute(params)
            .await
            .map_err(cdp_error("Page.setDocumentContent"))?;
        Ok(())
    }

    async fn print_to_pdf(&self, settings: &PrintSettings) -> Result<Vec<u8>, TransportError> {
        diag!(
            self.logger,
            "cdp -> Page.printToPDF printBackground={}",
            settings.print_background
        );
        let layout = &settings.layout;
        let params = PrintToPdfParams {
            print_background: Some(settings.print_background),
            landscape: layout.landscape,
            scale: layout.scale,
            paper_width: layout.paper_width,
            paper_height: layout.paper_height,
            margin_top: layout.margin_top,
            margin_bottom: layout.margin_bottom,
            margin_left: layout.margin_left,
            margin_right: layout.margin_right,
            prefer_css_page_size: layout.prefer_css_page_size,
            page_ranges: layout.page_ranges.clone(),
            ..PrintToPdfParams::default()
        };
        let pdf = self
            .page
            .pdf(params)
            .await
            .map_err(cdp_error("Page.printToPDF"))?;
        diag!(self.logger, "cdp <- Page.printToPDF ({} bytes)", pdf.len());
        Ok(pdf)
    }

    async fn close(mut self) -> Result<(), TransportError> {
        diag!(self.logger, "closing browser session");
        let browser = self.browser.get_mut();
        let closed = browser.close().await.map(|_| ());
        let exited = browser.wait().await;

        if tokio::time::timeout(HANDLER_SHUTDOWN_TIMEOUT, &mut self.handler_task)
            .await
            .is_err()
        {
            self.handler_task.abort();
        }

        closed.map_err(cdp_error("Browser.close"))?;
        exited.map_err(|e| TransportError::new(format!("waiting for browser exit: {e}")))?;
        Ok(())
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}
