use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, warn};
use url::Url;

use super::browser::{
    BrowserDriver, BrowserError, BrowserSession, LaunchOptions, LoadCondition, PdfLayout,
};
use crate::config::ExportConfig;

/// Upper bound on browser shutdown once an export has finished or failed.
const CLOSE_GRACE: Duration = Duration::from_secs(10);

/// Deadline offset used when the configured timeout overflows `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Step of an export a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    Launch,
    OpenPage,
    Navigate,
    WaitForBody,
    Capture,
}

impl ExportStage {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Launch => "launching browser",
            Self::OpenPage => "opening page",
            Self::Navigate => "loading document",
            Self::WaitForBody => "waiting for document body",
            Self::Capture => "capturing pdf",
        }
    }
}

impl fmt::Display for ExportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("export target '{0}' does not form a valid url")]
    Target(String),
    #[error("export failed while {stage}: {source}")]
    Failed {
        stage: ExportStage,
        #[source]
        source: BrowserError,
    },
    #[error("export timed out after {timeout:?} while {stage}")]
    TimedOut {
        stage: ExportStage,
        timeout: Duration,
    },
}

impl ExportError {
    pub fn stage(&self) -> Option<ExportStage> {
        match self {
            Self::Target(_) => None,
            Self::Failed { stage, .. } | Self::TimedOut { stage, .. } => Some(*stage),
        }
    }
}

/// Prints rendered package views to PDF, one browser process per export.
#[derive(Clone)]
pub struct PdfExportEngine {
    driver: Arc<dyn BrowserDriver>,
    base: Url,
    launch: LaunchOptions,
    layout: PdfLayout,
    timeout: Duration,
}

impl PdfExportEngine {
    pub fn new(driver: Arc<dyn BrowserDriver>, config: &ExportConfig) -> Self {
        Self {
            driver,
            base: config.pdf_app_url.clone(),
            launch: LaunchOptions::container().with_executable(config.chrome_executable.clone()),
            layout: PdfLayout::letter_landscape(),
            timeout: config.timeout,
        }
    }

    pub fn target_url(&self, target_id: &str) -> Result<Url, ExportError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ExportError::Target(target_id.to_string()))?
            .pop_if_empty()
            .push(target_id);
        Ok(url)
    }

    /// Renders `target_id` and returns the PDF bytes.
    ///
    /// The browser launched for the export is closed whatever the outcome,
    /// including when the returned future is dropped mid-export.
    pub async fn export(&self, target_id: &str) -> Result<Vec<u8>, ExportError> {
        let url = self.target_url(target_id)?;
        let started = Instant::now();
        let deadline = started
            .checked_add(self.timeout)
            .unwrap_or_else(|| started + FAR_FUTURE);

        let session = match timeout_at(deadline, self.driver.launch(&self.launch)).await {
            Ok(Ok(session)) => session,
            Ok(Err(source)) => {
                warn!(target_id, error = %source, "browser launch failed");
                return Err(ExportError::Failed {
                    stage: ExportStage::Launch,
                    source,
                });
            }
            Err(_) => {
                warn!(target_id, "browser launch timed out");
                return Err(ExportError::TimedOut {
                    stage: ExportStage::Launch,
                    timeout: self.timeout,
                });
            }
        };
        debug!(target_id, "browser launched");
        let mut guard = SessionGuard::new(session, target_id);

        let mut stage = ExportStage::OpenPage;
        let captured = timeout_at(
            deadline,
            guard.capture(url.as_str(), &self.layout, &mut stage),
        )
        .await;
        let outcome = captured.unwrap_or(Err(ExportError::TimedOut {
            stage,
            timeout: self.timeout,
        }));

        guard.release().await;

        match &outcome {
            Ok(bytes) => info!(
                target_id,
                bytes = bytes.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "pdf exported"
            ),
            Err(err) => warn!(target_id, error = %err, "pdf export failed"),
        }

        outcome
    }
}

/// Owns a launched browser until it is closed. Dropped before
/// [`SessionGuard::release`] ran, it closes the browser on a runtime task.
struct SessionGuard {
    session: Option<Box<dyn BrowserSession>>,
    target_id: String,
}

impl SessionGuard {
    fn new(session: Box<dyn BrowserSession>, target_id: &str) -> Self {
        Self {
            session: Some(session),
            target_id: target_id.to_string(),
        }
    }

    async fn capture(
        &mut self,
        url: &str,
        layout: &PdfLayout,
        stage: &mut ExportStage,
    ) -> Result<Vec<u8>, ExportError> {
        let Some(session) = self.session.as_deref_mut() else {
            return Err(failed(
                ExportStage::OpenPage,
                BrowserError::Page("browser already released".to_string()),
            ));
        };
        capture(session, url, layout, stage).await
    }

    async fn release(mut self) {
        if let Some(session) = self.session.take() {
            close_session(session, &self.target_id).await;
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        let target_id = std::mem::take(&mut self.target_id);
        match Handle::try_current() {
            Ok(runtime) => {
                warn!(target_id, "export abandoned; closing browser in background");
                runtime.spawn(async move { close_session(session, &target_id).await });
            }
            Err(_) => warn!(target_id, "export abandoned outside a runtime; browser not closed"),
        }
    }
}

async fn capture(
    session: &mut dyn BrowserSession,
    url: &str,
    layout: &PdfLayout,
    stage: &mut ExportStage,
) -> Result<Vec<u8>, ExportError> {
    *stage = ExportStage::OpenPage;
    let mut page = session
        .new_page()
        .await
        .map_err(|source| failed(ExportStage::OpenPage, source))?;

    *stage = ExportStage::Navigate;
    page.navigate(url, &LoadCondition::all())
        .await
        .map_err(|source| failed(ExportStage::Navigate, source))?;

    *stage = ExportStage::WaitForBody;
    page.wait_for_element("body")
        .await
        .map_err(|source| failed(ExportStage::WaitForBody, source))?;

    *stage = ExportStage::Capture;
    page.print_pdf(layout)
        .await
        .map_err(|source| failed(ExportStage::Capture, source))
}

fn failed(stage: ExportStage, source: BrowserError) -> ExportError {
    ExportError::Failed { stage, source }
}

async fn close_session(mut session: Box<dyn BrowserSession>, target_id: &str) {
    match timeout(CLOSE_GRACE, session.close()).await {
        Ok(Ok(())) => debug!(target_id, "browser closed"),
        Ok(Err(err)) => warn!(target_id, error = %err, "browser did not close cleanly"),
        Err(_) => warn!(target_id, "browser close timed out; dropping session"),
    }
}
