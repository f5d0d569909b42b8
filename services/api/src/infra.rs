use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;
use valuation_render::config::AppConfig;
use valuation_render::error::AppError;
use valuation_render::export::{ChromiumDriver, PdfExportEngine};
use valuation_render::gateway::GatewayState;
use valuation_render::package::{
    Geocoder, GoogleGeocoder, HttpPackageBackend, ImageAssignmentService, PackageAggregator,
    StaticMapBuilder, StoredCoordinates,
};
use valuation_render::render::HandlebarsRenderer;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn export_engine(config: &AppConfig) -> PdfExportEngine {
    PdfExportEngine::new(Arc::new(ChromiumDriver), &config.export)
}

/// Wires the concrete backend, enrichment, renderer and browser collaborators.
pub(crate) fn gateway_state(config: &AppConfig) -> Result<GatewayState, AppError> {
    let backend = Arc::new(HttpPackageBackend::new(&config.backend)?);

    let geocoder: Arc<dyn Geocoder> = match &config.maps.api_key {
        Some(key) => Arc::new(GoogleGeocoder::new(key.clone(), config.backend.timeout)?),
        None => {
            info!("MAPS_API_KEY not set; using stored coordinates only");
            Arc::new(StoredCoordinates)
        }
    };
    let maps = Arc::new(StaticMapBuilder::new(config.maps.api_key.clone())?);

    let views = HandlebarsRenderer::from_template_path(config.views.template_path.as_deref())?;

    Ok(GatewayState {
        packages: PackageAggregator::new(backend.clone(), geocoder, maps),
        images: ImageAssignmentService::new(backend),
        exporter: export_engine(config),
        views: Arc::new(views),
        fallback_not_found: config.server.fallback_not_found,
    })
}
