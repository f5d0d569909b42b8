use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use url::Url;
use valuation_render::config::ExportConfig;
use valuation_render::export::{
    BrowserDriver, BrowserError, BrowserPage, BrowserSession, ExportError, ExportStage,
    LaunchOptions, LoadCondition, PdfExportEngine, PdfLayout,
};

#[derive(Default)]
struct Ledger {
    launched: AtomicUsize,
    closed: AtomicUsize,
    visited: Mutex<Vec<String>>,
}

/// Browser whose navigation hangs for any target starting with "stall".
struct ScriptedDriver {
    ledger: Arc<Ledger>,
}

struct ScriptedSession {
    ledger: Arc<Ledger>,
}

struct ScriptedPage {
    ledger: Arc<Ledger>,
}

#[async_trait]
impl BrowserDriver for ScriptedDriver {
    async fn launch(
        &self,
        _options: &LaunchOptions,
    ) -> Result<Box<dyn BrowserSession>, BrowserError> {
        self.ledger.launched.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            ledger: self.ledger.clone(),
        }))
    }
}

#[async_trait]
impl BrowserSession for ScriptedSession {
    async fn new_page(&mut self) -> Result<Box<dyn BrowserPage>, BrowserError> {
        Ok(Box::new(ScriptedPage {
            ledger: self.ledger.clone(),
        }))
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        self.ledger.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl BrowserPage for ScriptedPage {
    async fn navigate(&mut self, url: &str, until: &[LoadCondition]) -> Result<(), BrowserError> {
        assert_eq!(until, LoadCondition::all().as_slice());
        self.ledger
            .visited
            .lock()
            .expect("visited mutex")
            .push(url.to_string());
        if url.contains("/stall") {
            futures::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn wait_for_element(&mut self, selector: &str) -> Result<(), BrowserError> {
        assert_eq!(selector, "body");
        Ok(())
    }

    async fn print_pdf(&mut self, layout: &PdfLayout) -> Result<Vec<u8>, BrowserError> {
        assert!(layout.landscape && layout.print_background);
        Ok(b"%PDF-1.7 test".to_vec())
    }
}

fn engine(ledger: Arc<Ledger>, timeout: Duration) -> PdfExportEngine {
    let config = ExportConfig {
        pdf_app_url: Url::parse("http://render.test:4000").expect("url parses"),
        timeout,
        chrome_executable: None,
    };
    PdfExportEngine::new(Arc::new(ScriptedDriver { ledger }), &config)
}

#[tokio::test]
async fn export_prints_the_rendering_application_view() {
    let ledger = Arc::new(Ledger::default());
    let engine = engine(ledger.clone(), Duration::from_secs(5));

    let bytes = engine.export("42").await.expect("export succeeds");

    assert!(bytes.starts_with(b"%PDF"));
    assert_eq!(
        *ledger.visited.lock().unwrap(),
        vec!["http://render.test:4000/42".to_string()]
    );
    assert_eq!(ledger.launched.load(Ordering::SeqCst), 1);
    assert_eq!(ledger.closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn concurrent_stalled_exports_release_every_browser() {
    let ledger = Arc::new(Ledger::default());
    let engine = engine(ledger.clone(), Duration::from_millis(50));

    let exports = (0..8).map(|index| {
        let engine = engine.clone();
        async move {
            let target = if index % 2 == 0 {
                format!("stall-{index}")
            } else {
                index.to_string()
            };
            engine.export(&target).await
        }
    });
    let outcomes = futures::future::join_all(exports).await;

    for (index, outcome) in outcomes.into_iter().enumerate() {
        if index % 2 == 0 {
            assert!(matches!(
                outcome,
                Err(ExportError::TimedOut {
                    stage: ExportStage::Navigate,
                    ..
                })
            ));
        } else {
            assert!(outcome.is_ok());
        }
    }
    assert_eq!(ledger.launched.load(Ordering::SeqCst), 8);
    assert_eq!(ledger.closed.load(Ordering::SeqCst), 8);
}
