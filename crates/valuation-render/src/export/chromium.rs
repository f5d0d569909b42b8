//! Headless Chromium driven over the DevTools protocol.

use std::collections::HashSet;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::{
    EventLifecycleEvent, PrintToPdfParams, SetLifecycleEventsEnabledParams,
};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::browser::{
    BrowserDriver, BrowserError, BrowserPage, BrowserSession, LaunchOptions, LoadCondition,
    PdfLayout,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct ChromiumDriver;

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn launch(
        &self,
        options: &LaunchOptions,
    ) -> Result<Box<dyn BrowserSession>, BrowserError> {
        let mut builder = BrowserConfig::builder();
        for arg in &options.args {
            builder = builder.arg(arg.as_str());
        }
        if let Some(executable) = &options.executable {
            builder = builder.chrome_executable(executable);
        }
        let config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|err| BrowserError::Launch(err.to_string()))?;

        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    trace!(error = %err, "devtools handler event error");
                }
            }
        });

        Ok(Box::new(ChromiumSession {
            browser,
            events,
            closed: false,
        }))
    }
}

pub struct ChromiumSession {
    browser: Browser,
    events: JoinHandle<()>,
    closed: bool,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn new_page(&mut self) -> Result<Box<dyn BrowserPage>, BrowserError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|err| BrowserError::Page(err.to_string()))?;

        page.execute(SetLifecycleEventsEnabledParams::new(true))
            .await
            .map_err(|err| BrowserError::Page(err.to_string()))?;

        Ok(Box::new(ChromiumPage { page }))
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let closed = self
            .browser
            .close()
            .await
            .map_err(|err| BrowserError::Shutdown(err.to_string()));
        if closed.is_err() {
            self.browser.kill().await;
        }
        if let Err(err) = self.browser.wait().await {
            debug!(error = %err, "waiting on browser process failed");
        }
        self.events.abort();

        closed.map(|_| ())
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        self.events.abort();
    }
}

pub struct ChromiumPage {
    page: Page,
}

#[async_trait]
impl BrowserPage for ChromiumPage {
    async fn navigate(&mut self, url: &str, until: &[LoadCondition]) -> Result<(), BrowserError> {
        let navigation_error = |reason: String| BrowserError::Navigation {
            url: url.to_string(),
            reason,
        };

        let main_frame = self
            .page
            .mainframe()
            .await
            .map_err(|err| navigation_error(err.to_string()))?
            .ok_or_else(|| navigation_error("page has no main frame".to_string()))?;

        // Subscribe before navigating so no lifecycle event is missed.
        let mut lifecycle = self
            .page
            .event_listener::<EventLifecycleEvent>()
            .await
            .map_err(|err| navigation_error(err.to_string()))?;

        self.page
            .goto(url)
            .await
            .map_err(|err| navigation_error(err.to_string()))?;

        let mut wait = LifecycleWait::new(main_frame.inner().as_str(), until);
        while !wait.settled() {
            let Some(event) = lifecycle.next().await else {
                return Err(navigation_error(
                    "page closed before the document settled".to_string(),
                ));
            };
            trace!(
                name = %event.name,
                frame = %event.frame_id.inner(),
                "lifecycle event"
            );
            wait.observe(event.frame_id.inner(), event.loader_id.inner(), &event.name);
        }

        Ok(())
    }

    async fn wait_for_element(&mut self, selector: &str) -> Result<(), BrowserError> {
        self.page
            .find_element(selector)
            .await
            .map(|_| ())
            .map_err(|_| BrowserError::MissingElement(selector.to_string()))
    }

    async fn print_pdf(&mut self, layout: &PdfLayout) -> Result<Vec<u8>, BrowserError> {
        let params = PrintToPdfParams {
            landscape: Some(layout.landscape),
            print_background: Some(layout.print_background),
            paper_width: Some(layout.paper_width),
            paper_height: Some(layout.paper_height),
            ..PrintToPdfParams::default()
        };

        self.page
            .pdf(params)
            .await
            .map_err(|err| BrowserError::Capture(err.to_string()))
    }
}

/// Tracks the main frame's lifecycle milestones for one navigation.
///
/// Only events from the main frame count. Each `init` starts a new document,
/// so milestones are collected again under that document's loader.
#[derive(Debug)]
struct LifecycleWait {
    main_frame: String,
    wanted: Vec<&'static str>,
    loader: Option<String>,
    seen: HashSet<String>,
}

impl LifecycleWait {
    fn new(main_frame: &str, until: &[LoadCondition]) -> Self {
        Self {
            main_frame: main_frame.to_string(),
            wanted: until.iter().map(|c| c.lifecycle_event()).collect(),
            loader: None,
            seen: HashSet::new(),
        }
    }

    /// Records one lifecycle event and reports whether the wait is over.
    fn observe(&mut self, frame_id: &str, loader_id: &str, name: &str) -> bool {
        if frame_id != self.main_frame {
            return self.settled();
        }
        if name == "init" {
            self.loader = Some(loader_id.to_string());
            self.seen.clear();
        } else if self.loader.as_deref() == Some(loader_id) {
            self.seen.insert(name.to_string());
        }
        self.settled()
    }

    fn settled(&self) -> bool {
        self.wanted.iter().all(|name| self.seen.contains(*name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAIN: &str = "main-frame";

    fn wait_for_all() -> LifecycleWait {
        LifecycleWait::new(MAIN, &LoadCondition::all())
    }

    #[test]
    fn settles_once_every_milestone_arrives_in_any_order() {
        let mut wait = wait_for_all();
        assert!(!wait.observe(MAIN, "L1", "init"));
        assert!(!wait.observe(MAIN, "L1", "load"));
        assert!(!wait.observe(MAIN, "L1", "networkIdle"));
        assert!(wait.observe(MAIN, "L1", "DOMContentLoaded"));
    }

    #[test]
    fn repeated_init_starts_over() {
        let mut wait = wait_for_all();
        wait.observe(MAIN, "L1", "init");
        wait.observe(MAIN, "L1", "DOMContentLoaded");
        wait.observe(MAIN, "L1", "load");

        assert!(!wait.observe(MAIN, "L2", "init"));
        assert!(!wait.observe(MAIN, "L2", "networkIdle"));
        assert!(!wait.observe(MAIN, "L2", "DOMContentLoaded"));
        assert!(wait.observe(MAIN, "L2", "load"));
    }

    #[test]
    fn child_frames_neither_reset_nor_satisfy_the_wait() {
        let mut wait = wait_for_all();
        wait.observe(MAIN, "L1", "init");
        wait.observe(MAIN, "L1", "DOMContentLoaded");
        wait.observe(MAIN, "L1", "networkIdle");

        assert!(!wait.observe("ad-iframe", "F1", "init"));
        assert!(!wait.observe("ad-iframe", "F1", "load"));
        assert!(wait.observe(MAIN, "L1", "load"));
    }

    #[test]
    fn events_outside_the_current_document_are_ignored() {
        let mut wait = wait_for_all();
        assert!(!wait.observe(MAIN, "L0", "DOMContentLoaded"));
        assert!(!wait.observe(MAIN, "L0", "networkIdle"));
        assert!(!wait.observe(MAIN, "L0", "load"));

        wait.observe(MAIN, "L1", "init");
        assert!(!wait.observe(MAIN, "L0", "load"));
        wait.observe(MAIN, "L1", "DOMContentLoaded");
        wait.observe(MAIN, "L1", "networkIdle");
        assert!(!wait.settled());
        assert!(wait.observe(MAIN, "L1", "load"));
    }

    #[test]
    fn nothing_to_wait_for_is_settled_immediately() {
        assert!(LifecycleWait::new(MAIN, &[]).settled());
    }
}
