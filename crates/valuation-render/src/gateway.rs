use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{de, Deserialize, Deserializer};
use serde_json::Value;
use tracing::{error, warn};

use crate::export::PdfExportEngine;
use crate::package::{ImageAssignmentService, PackageAggregator};
use crate::render::{ViewRenderer, INDEX_VIEW};

pub const PACKAGE_NOT_FOUND: &str = "Package not found";
pub const IMAGE_SAVED: &str = "Image saved";
pub const IMAGE_NOT_SAVED: &str = "Image could not be saved";
pub const PDF_NOT_EXPORTED: &str = "PDF could not be exported";
pub const VIEW_NOT_RENDERED: &str = "Package could not be rendered";

/// Collaborators behind the public routes.
#[derive(Clone)]
pub struct GatewayState {
    pub packages: PackageAggregator,
    pub images: ImageAssignmentService,
    pub exporter: PdfExportEngine,
    pub views: Arc<dyn ViewRenderer>,
    /// Answer unmatched paths with 404 rather than an empty 200.
    pub fallback_not_found: bool,
}

/// Router builder exposing the package view, image assignment and PDF export.
pub fn gateway_router(state: GatewayState) -> Router {
    Router::new()
        .route("/:package_id", get(view_handler))
        .route("/api/saveImage", post(save_image_handler))
        .route("/export/pdf/:id", get(export_handler))
        .fallback(fallback_handler)
        .with_state(Arc::new(state))
}

#[derive(Debug, Deserialize)]
pub(crate) struct SaveImageRequest {
    #[serde(rename = "packageID", deserialize_with = "package_id_text")]
    pub(crate) package_id: String,
    #[serde(rename = "imageID")]
    pub(crate) image_id: String,
    pub(crate) url: String,
}

/// Editors post the package id as either a JSON string or number.
fn package_id_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(id) => Ok(id),
        Value::Number(id) => Ok(id.to_string()),
        other => Err(de::Error::custom(format!(
            "packageID must be a string or number, got {other}"
        ))),
    }
}

pub(crate) async fn view_handler(
    State(state): State<Arc<GatewayState>>,
    Path(package_id): Path<String>,
) -> Response {
    let context = match state.packages.context(&package_id).await {
        Ok(context) => context,
        Err(_) => return (StatusCode::FORBIDDEN, PACKAGE_NOT_FOUND).into_response(),
    };

    match state.views.render(INDEX_VIEW, &context) {
        Ok(html) => Html(html).into_response(),
        Err(err) => {
            error!(package_id, error = %err, "package view failed to render");
            (StatusCode::INTERNAL_SERVER_ERROR, VIEW_NOT_RENDERED).into_response()
        }
    }
}

pub(crate) async fn save_image_handler(
    State(state): State<Arc<GatewayState>>,
    payload: Result<Json<SaveImageRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(request) => request,
        Err(rejection) => {
            warn!(error = %rejection, "image save request rejected");
            return (StatusCode::INTERNAL_SERVER_ERROR, IMAGE_NOT_SAVED).into_response();
        }
    };

    match state
        .images
        .assign(&request.package_id, &request.image_id, &request.url)
        .await
    {
        Ok(_) => (StatusCode::OK, IMAGE_SAVED).into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, IMAGE_NOT_SAVED).into_response(),
    }
}

pub(crate) async fn export_handler(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> Response {
    match state.exporter.export(&id).await {
        Ok(bytes) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, mime::APPLICATION_PDF.to_string()),
                (header::CONTENT_DISPOSITION, inline_disposition(&id)),
            ],
            bytes,
        )
            .into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, PDF_NOT_EXPORTED).into_response(),
    }
}

pub(crate) async fn fallback_handler(State(state): State<Arc<GatewayState>>) -> StatusCode {
    if state.fallback_not_found {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::OK
    }
}

fn inline_disposition(id: &str) -> String {
    let stem: String = id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        .collect();
    let filename = if stem.is_empty() {
        "valuation.pdf".to_string()
    } else {
        format!("valuation-{stem}.pdf")
    };
    format!("inline; filename=\"{filename}\"")
}
