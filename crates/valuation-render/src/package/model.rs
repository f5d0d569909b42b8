use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::slots::ImageSlot;

/// Valuation record as served by the backend, kept as an open JSON object so
/// columns the renderer does not know about still reach the template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Package(Map<String, Value>);

impl Package {
    /// Accepts only JSON objects; anything else is not a package.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self(fields)),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.0.get_mut(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// Non-empty string value of a column.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }
}

/// Body of `GET /packages/{id}/full_package`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FullPackage {
    #[serde(default)]
    pub package: Option<Value>,
    #[serde(default)]
    pub user: Option<Value>,
}

/// Data handed to the view renderer.
#[derive(Debug, Clone, Serialize)]
pub struct RenderContext {
    pub valuation: Package,
    pub user: Value,
    pub images: BTreeMap<ImageSlot, String>,
}

impl RenderContext {
    pub fn image(&self, slot: ImageSlot) -> Option<&str> {
        self.images.get(&slot).map(String::as_str)
    }
}

/// Partial update body for `PUT /packages/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackagePatch {
    pub package: Map<String, Value>,
}

impl PackagePatch {
    pub fn image(slot: ImageSlot, url: &str) -> Self {
        let mut package = Map::new();
        package.insert(slot.field().to_string(), Value::String(url.to_string()));
        Self { package }
    }
}
