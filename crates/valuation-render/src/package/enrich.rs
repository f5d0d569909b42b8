//! Location enrichment: coordinates for every addressable entry of a package,
//! then static map images built from those coordinates.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Number, Value};
use tracing::debug;
use url::Url;

use super::model::Package;

/// Package relations that carry addresses.
pub const LOCATED_RELATIONS: [&str; 3] = ["property", "recent_sales", "rent_comparables"];

const GOOGLE_GEOCODE_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/geocode/json";
const GOOGLE_STATIC_MAP_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/staticmap";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.latitude, self.longitude)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EnrichmentError {
    #[error("geocoding request failed: {0}")]
    Geocoder(String),
    #[error("invalid enrichment endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
    #[error("geocoder rejected '{address}' with status {status}")]
    GeocoderStatus { address: String, status: String },
}

/// Address lookup capability.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> Result<Option<Coordinates>, EnrichmentError>;
}

/// Synthesizes map image URLs onto a coordinate-enriched package.
#[async_trait]
pub trait MapImageSource: Send + Sync {
    async fn add_map_urls(&self, package: Package) -> Result<Package, EnrichmentError>;
}

/// Geocoder that never looks anything up; entries keep the coordinates the
/// backend already stored.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoredCoordinates;

#[async_trait]
impl Geocoder for StoredCoordinates {
    async fn geocode(&self, _address: &str) -> Result<Option<Coordinates>, EnrichmentError> {
        Ok(None)
    }
}

/// Google Geocoding API client.
#[derive(Clone)]
pub struct GoogleGeocoder {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl GoogleGeocoder {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, EnrichmentError> {
        let endpoint = Url::parse(GOOGLE_GEOCODE_ENDPOINT)?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| EnrichmentError::Geocoder(err.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            api_key: api_key.into(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }
}

impl fmt::Debug for GoogleGeocoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleGeocoder")
            .field("endpoint", &self.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: GeocodeGeometry,
}

#[derive(Debug, Deserialize)]
struct GeocodeGeometry {
    location: GeocodeLocation,
}

#[derive(Debug, Deserialize)]
struct GeocodeLocation {
    lat: f64,
    lng: f64,
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<Coordinates>, EnrichmentError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[("address", address), ("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|err| EnrichmentError::Geocoder(err.to_string()))?
            .error_for_status()
            .map_err(|err| EnrichmentError::Geocoder(err.to_string()))?;

        let body: GeocodeResponse = response
            .json()
            .await
            .map_err(|err| EnrichmentError::Geocoder(err.to_string()))?;

        match body.status.as_str() {
            "OK" => Ok(body.results.first().map(|result| Coordinates {
                latitude: result.geometry.location.lat,
                longitude: result.geometry.location.lng,
            })),
            "ZERO_RESULTS" => Ok(None),
            _ => Err(EnrichmentError::GeocoderStatus {
                address: address.to_string(),
                status: body.status,
            }),
        }
    }
}

/// Fills `latitude`/`longitude` on every addressable entry that lacks them.
///
/// Entries are resolved one at a time, in relation order.
pub async fn resolve_coordinates(
    mut package: Package,
    geocoder: &dyn Geocoder,
) -> Result<Package, EnrichmentError> {
    for relation in LOCATED_RELATIONS {
        let Some(value) = package.get_mut(relation) else {
            continue;
        };

        for entry in entries_mut(value) {
            if coordinates_of(entry).is_some() {
                continue;
            }
            let Some(address) = address_of(entry) else {
                continue;
            };

            match geocoder.geocode(&address).await? {
                Some(found) => {
                    debug!(relation, %found, "resolved coordinates");
                    write_coordinates(entry, found);
                }
                None => debug!(relation, "no coordinates for address"),
            }
        }
    }

    Ok(package)
}

fn entries_mut(value: &mut Value) -> Vec<&mut Map<String, Value>> {
    match value {
        Value::Array(items) => items.iter_mut().filter_map(Value::as_object_mut).collect(),
        Value::Object(entry) => vec![entry],
        _ => Vec::new(),
    }
}

fn entries(value: Option<&Value>) -> Vec<&Map<String, Value>> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_object).collect(),
        Some(Value::Object(entry)) => vec![entry],
        _ => Vec::new(),
    }
}

pub fn coordinates_of(entry: &Map<String, Value>) -> Option<Coordinates> {
    let read = |key: &str| match entry.get(key)? {
        Value::Number(number) => number.as_f64(),
        Value::String(raw) => raw.trim().parse::<f64>().ok(),
        _ => None,
    };

    Some(Coordinates {
        latitude: read("latitude")?,
        longitude: read("longitude")?,
    })
}

fn address_of(entry: &Map<String, Value>) -> Option<String> {
    let text = |key: &str| {
        entry
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    if let Some(full) = text("full_address") {
        return Some(full.to_string());
    }

    let street = text("address")?;
    let parts: Vec<&str> = std::iter::once(street)
        .chain(["city", "state", "zip"].into_iter().filter_map(text))
        .collect();
    Some(parts.join(", "))
}

fn write_coordinates(entry: &mut Map<String, Value>, found: Coordinates) {
    for (key, amount) in [("latitude", found.latitude), ("longitude", found.longitude)] {
        if let Some(number) = Number::from_f64(amount) {
            entry.insert(key.to_string(), Value::Number(number));
        }
    }
}

/// Google Static Maps URL synthesis. Makes no network calls.
#[derive(Clone)]
pub struct StaticMapBuilder {
    endpoint: Url,
    api_key: Option<String>,
    size: String,
    zoom: u8,
}

impl StaticMapBuilder {
    pub fn new(api_key: Option<String>) -> Result<Self, EnrichmentError> {
        Ok(Self {
            endpoint: Url::parse(GOOGLE_STATIC_MAP_ENDPOINT)?,
            api_key,
            size: "640x400".to_string(),
            zoom: 15,
        })
    }

    pub fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }

    fn map_url(&self, center: Option<Coordinates>, markers: &[String]) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("size", &self.size).append_pair("scale", "2");
            if let Some(center) = center {
                query
                    .append_pair("center", &center.to_string())
                    .append_pair("zoom", &self.zoom.to_string());
            }
            for marker in markers {
                query.append_pair("markers", marker);
            }
            if let Some(key) = &self.api_key {
                query.append_pair("key", key);
            }
        }
        url
    }
}

impl fmt::Debug for StaticMapBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticMapBuilder")
            .field("endpoint", &self.endpoint.as_str())
            .field("size", &self.size)
            .field("zoom", &self.zoom)
            .finish_non_exhaustive()
    }
}

fn marker_label(index: usize) -> Option<char> {
    match index {
        0..=8 => char::from_digit(index as u32 + 1, 10),
        9..=34 => char::from_u32('A' as u32 + (index - 9) as u32),
        _ => None,
    }
}

#[async_trait]
impl MapImageSource for StaticMapBuilder {
    async fn add_map_urls(&self, mut package: Package) -> Result<Package, EnrichmentError> {
        let subject = entries(package.get("property"))
            .first()
            .and_then(|entry| coordinates_of(entry));
        let subject_marker = subject.map(|at| format!("color:red|{at}"));

        if let Some(marker) = &subject_marker {
            let url = self.map_url(subject, std::slice::from_ref(marker));
            package.insert("property_map_url", Value::String(url.into()));
        }

        for (relation, field) in [
            ("recent_sales", "recent_sales_map_url"),
            ("rent_comparables", "rent_comparables_map_url"),
        ] {
            let comparables: Vec<Coordinates> = entries(package.get(relation))
                .into_iter()
                .filter_map(coordinates_of)
                .collect();
            if comparables.is_empty() {
                continue;
            }

            let mut markers: Vec<String> = subject_marker.iter().cloned().collect();
            markers.extend(comparables.iter().enumerate().map(|(index, at)| {
                match marker_label(index) {
                    Some(label) => format!("color:blue|label:{label}|{at}"),
                    None => format!("color:blue|{at}"),
                }
            }));

            let url = self.map_url(None, &markers);
            package.insert(field, Value::String(url.into()));
        }

        Ok(package)
    }
}
