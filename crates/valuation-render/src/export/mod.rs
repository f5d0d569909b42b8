//! PDF capture of rendered package views through a headless browser.

pub mod browser;
pub mod chromium;
pub mod engine;

pub use browser::{
    BrowserDriver, BrowserError, BrowserPage, BrowserSession, LaunchOptions, LoadCondition,
    PdfLayout, CONTAINER_ARGS,
};
pub use chromium::ChromiumDriver;
pub use engine::{ExportError, ExportStage, PdfExportEngine};
