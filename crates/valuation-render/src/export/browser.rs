use std::path::PathBuf;

use async_trait::async_trait;

/// Chromium flags for running inside a locked-down container.
pub const CONTAINER_ARGS: [&str; 4] = [
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--single-process",
    "--no-sandbox",
];

/// Document lifecycle milestones a navigation must reach before capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadCondition {
    DomContentLoaded,
    NetworkIdle,
    Load,
}

impl LoadCondition {
    pub const fn all() -> [Self; 3] {
        [Self::DomContentLoaded, Self::NetworkIdle, Self::Load]
    }

    /// Name of the matching Chrome DevTools lifecycle event.
    pub const fn lifecycle_event(self) -> &'static str {
        match self {
            Self::DomContentLoaded => "DOMContentLoaded",
            Self::NetworkIdle => "networkIdle",
            Self::Load => "load",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    pub args: Vec<String>,
    pub executable: Option<PathBuf>,
}

impl LaunchOptions {
    pub fn container() -> Self {
        Self {
            args: CONTAINER_ARGS.iter().map(|arg| arg.to_string()).collect(),
            executable: None,
        }
    }

    pub fn with_executable(mut self, executable: Option<PathBuf>) -> Self {
        self.executable = executable;
        self
    }
}

/// Paper format for captured documents, in inches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfLayout {
    pub paper_width: f64,
    pub paper_height: f64,
    pub landscape: bool,
    pub print_background: bool,
}

impl PdfLayout {
    pub const fn letter_landscape() -> Self {
        Self {
            paper_width: 8.5,
            paper_height: 11.0,
            landscape: true,
            print_background: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("browser could not be launched: {0}")]
    Launch(String),
    #[error("browser page could not be opened: {0}")]
    Page(String),
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("page never produced '{0}'")]
    MissingElement(String),
    #[error("pdf capture failed: {0}")]
    Capture(String),
    #[error("browser shutdown failed: {0}")]
    Shutdown(String),
}

/// Starts browser processes.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn launch(&self, options: &LaunchOptions)
        -> Result<Box<dyn BrowserSession>, BrowserError>;
}

/// One running browser process.
#[async_trait]
pub trait BrowserSession: Send {
    async fn new_page(&mut self) -> Result<Box<dyn BrowserPage>, BrowserError>;

    /// Terminates the process. Must be safe to call after a failed step.
    async fn close(&mut self) -> Result<(), BrowserError>;
}

/// A tab inside a [`BrowserSession`].
#[async_trait]
pub trait BrowserPage: Send {
    /// Navigates and returns once every condition in `until` has been observed.
    async fn navigate(&mut self, url: &str, until: &[LoadCondition]) -> Result<(), BrowserError>;

    async fn wait_for_element(&mut self, selector: &str) -> Result<(), BrowserError>;

    async fn print_pdf(&mut self, layout: &PdfLayout) -> Result<Vec<u8>, BrowserError>;
}
