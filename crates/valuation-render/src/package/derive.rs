use serde_json::{Map, Number, Value};

use super::model::Package;

/// Unit rows with computed rent figures, taken from the package as fetched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedUnits(Vec<Value>);

impl DerivedUnits {
    pub fn rows(&self) -> &[Value] {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Array(self.0)
    }
}

/// Computes per-unit rent figures from `property_units`.
///
/// Rows that are not objects are carried over untouched. Numeric columns may
/// arrive either as numbers or as decimal strings.
pub fn derive_units(package: &Package) -> DerivedUnits {
    let rows = match package.get("property_units") {
        Some(Value::Array(rows)) => rows,
        _ => return DerivedUnits::default(),
    };

    DerivedUnits(
        rows.iter()
            .map(|row| match row {
                Value::Object(fields) => Value::Object(derive_row(fields)),
                other => other.clone(),
            })
            .collect(),
    )
}

fn derive_row(fields: &Map<String, Value>) -> Map<String, Value> {
    let mut row = fields.clone();
    let count = number(fields.get("units")).unwrap_or(1.0);

    if let Some(rent) = number(fields.get("monthly_rent")) {
        let total_monthly = count * rent;
        row.insert("total_monthly_rent".to_string(), to_value(total_monthly));
        row.insert("annual_rent".to_string(), to_value(total_monthly * 12.0));

        if let Some(square_feet) = number(fields.get("square_feet")).filter(|sf| *sf > 0.0) {
            let per_foot = (rent / square_feet * 100.0).round() / 100.0;
            row.insert("rent_per_square_foot".to_string(), to_value(per_foot));
        }
    }

    row
}

fn number(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(number) => number.as_f64(),
        Value::String(raw) => raw.trim().replace(',', "").parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|amount| amount.is_finite())
}

fn to_value(amount: f64) -> Value {
    if amount.fract() == 0.0 && amount.abs() < i64::MAX as f64 {
        Value::Number(Number::from(amount as i64))
    } else {
        Number::from_f64(amount).map_or(Value::Null, Value::Number)
    }
}
