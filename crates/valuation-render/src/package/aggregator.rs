use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::backend::{BackendError, PackageBackend};
use super::derive::{derive_units, DerivedUnits};
use super::enrich::{resolve_coordinates, EnrichmentError, Geocoder, MapImageSource};
use super::model::{FullPackage, Package, RenderContext};
use super::slots::ImageSlot;

/// Why a package could not be turned into a rendering context. Callers see a
/// single "not found" outcome regardless of the variant.
#[derive(Debug, thiserror::Error)]
pub enum PackageUnavailable {
    #[error("package fetch failed: {0}")]
    Fetch(#[from] BackendError),
    #[error("backend response has no {0} record")]
    MissingRecord(&'static str),
    #[error("coordinate resolution failed: {0}")]
    Coordinates(#[source] EnrichmentError),
    #[error("map url synthesis failed: {0}")]
    MapUrls(#[source] EnrichmentError),
}

/// Package in flight through the aggregation stages. The derived unit rows
/// ride along untouched until [`Enrichment::finish`] writes them back.
#[derive(Debug)]
struct Enrichment {
    package: Package,
    units: DerivedUnits,
    user: Value,
}

impl Enrichment {
    /// Validates the fetched body and derives unit values from the raw package.
    fn from_fetched(body: FullPackage) -> Result<Self, PackageUnavailable> {
        let package = body
            .package
            .and_then(Package::from_value)
            .ok_or(PackageUnavailable::MissingRecord("package"))?;
        let user = body
            .user
            .filter(|user| !user.is_null())
            .ok_or(PackageUnavailable::MissingRecord("user"))?;

        let units = derive_units(&package);
        Ok(Self {
            package,
            units,
            user,
        })
    }

    async fn locate(mut self, geocoder: &dyn Geocoder) -> Result<Self, PackageUnavailable> {
        self.package = resolve_coordinates(self.package, geocoder)
            .await
            .map_err(PackageUnavailable::Coordinates)?;
        Ok(self)
    }

    async fn add_maps(mut self, maps: &dyn MapImageSource) -> Result<Self, PackageUnavailable> {
        self.package = maps
            .add_map_urls(self.package)
            .await
            .map_err(PackageUnavailable::MapUrls)?;
        Ok(self)
    }

    /// Collapses the property relation and restores the derived unit rows.
    fn finish(self) -> RenderContext {
        let Self {
            mut package,
            units,
            user,
        } = self;

        let property = match package.get("property") {
            Some(Value::Array(items)) => items.first().cloned(),
            Some(Value::Object(entry)) => Some(Value::Object(entry.clone())),
            _ => None,
        }
        .filter(Value::is_object)
        .unwrap_or_else(|| Value::Object(Map::new()));
        package.insert("property", property);
        package.insert("property_units", units.into_value());

        let images = slot_images(&package);
        RenderContext {
            valuation: package,
            user,
            images,
        }
    }
}

/// Every registry slot whose column holds a non-empty URL.
pub fn slot_images(package: &Package) -> BTreeMap<ImageSlot, String> {
    ImageSlot::ordered()
        .into_iter()
        .filter_map(|slot| {
            package
                .text(slot.field())
                .map(|url| (slot, url.to_string()))
        })
        .collect()
}

/// Builds rendering contexts: fetch, derive, locate, map, reshape.
#[derive(Clone)]
pub struct PackageAggregator {
    backend: Arc<dyn PackageBackend>,
    geocoder: Arc<dyn Geocoder>,
    maps: Arc<dyn MapImageSource>,
}

impl PackageAggregator {
    pub fn new(
        backend: Arc<dyn PackageBackend>,
        geocoder: Arc<dyn Geocoder>,
        maps: Arc<dyn MapImageSource>,
    ) -> Self {
        Self {
            backend,
            geocoder,
            maps,
        }
    }

    pub async fn context(&self, package_id: &str) -> Result<RenderContext, PackageUnavailable> {
        let started = Instant::now();
        let result = self.run(package_id).await;

        match &result {
            Ok(context) => info!(
                package_id,
                images = context.images.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "package context assembled"
            ),
            Err(err) => warn!(package_id, error = %err, "package unavailable"),
        }

        result
    }

    async fn run(&self, package_id: &str) -> Result<RenderContext, PackageUnavailable> {
        let body = self.backend.full_package(package_id).await?;
        debug!(package_id, "package fetched");

        let enrichment = Enrichment::from_fetched(body)?
            .locate(self.geocoder.as_ref())
            .await?
            .add_maps(self.maps.as_ref())
            .await?;

        Ok(enrichment.finish())
    }
}
