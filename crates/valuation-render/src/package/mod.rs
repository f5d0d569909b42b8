//! Valuation package data: slot registry, backend access, enrichment and the
//! aggregation pipeline that produces rendering contexts.

pub mod aggregator;
pub mod backend;
pub mod derive;
pub mod enrich;
pub mod images;
pub mod model;
pub mod slots;

pub use aggregator::{slot_images, PackageAggregator, PackageUnavailable};
pub use backend::{BackendError, HttpPackageBackend, PackageBackend, API_KEY_HEADER};
pub use derive::{derive_units, DerivedUnits};
pub use enrich::{
    resolve_coordinates, Coordinates, EnrichmentError, Geocoder, GoogleGeocoder, MapImageSource,
    StaticMapBuilder, StoredCoordinates,
};
pub use images::{ImageAssignmentService, ImageSaveError};
pub use model::{FullPackage, Package, PackagePatch, RenderContext};
pub use slots::{ImageSlot, UnknownSlot};
