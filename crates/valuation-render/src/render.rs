//! HTML views of a valuation package.

use std::path::Path;

use handlebars::{Context, Handlebars, Helper, HelperResult, Output};
use serde_json::Value;

use crate::package::RenderContext;

/// View served for `GET /{package_id}`.
pub const INDEX_VIEW: &str = "index";

const INDEX_TEMPLATE: &str = include_str!("../templates/index.hbs");

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("no view named '{0}' is registered")]
    UnknownView(String),
    #[error("view template is invalid: {0}")]
    Template(#[from] handlebars::TemplateError),
    #[error("view could not be rendered: {0}")]
    Render(#[from] handlebars::RenderError),
}

/// Turns a rendering context into an HTML document.
pub trait ViewRenderer: Send + Sync {
    fn render(&self, view: &str, context: &RenderContext) -> Result<String, RenderError>;
}

pub struct HandlebarsRenderer {
    registry: Handlebars<'static>,
}

impl HandlebarsRenderer {
    /// Registry holding the built-in `index` view.
    pub fn embedded() -> Result<Self, RenderError> {
        let mut registry = Handlebars::new();
        registry.register_helper("currency", Box::new(currency_helper));
        registry.register_template_string(INDEX_VIEW, INDEX_TEMPLATE)?;
        Ok(Self { registry })
    }

    /// Built-in views, with `index` replaced by the file at `template_path`.
    pub fn from_template_path(template_path: Option<&Path>) -> Result<Self, RenderError> {
        let mut renderer = Self::embedded()?;
        if let Some(path) = template_path {
            renderer.registry.register_template_file(INDEX_VIEW, path)?;
        }
        Ok(renderer)
    }
}

impl ViewRenderer for HandlebarsRenderer {
    fn render(&self, view: &str, context: &RenderContext) -> Result<String, RenderError> {
        if !self.registry.has_template(view) {
            return Err(RenderError::UnknownView(view.to_string()));
        }
        Ok(self.registry.render(view, context)?)
    }
}

/// `{{currency value}}`: whole dollars with thousands separators, cents kept
/// when present. Non-numeric input renders as-is.
fn currency_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut handlebars::RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let rendered = match h.param(0).map(|param| param.value()) {
        Some(Value::Number(number)) => number.as_f64().map(format_currency),
        Some(Value::String(raw)) => Some(
            raw.replace(',', "")
                .trim()
                .parse::<f64>()
                .map(format_currency)
                .unwrap_or_else(|_| raw.clone()),
        ),
        _ => None,
    };
    if let Some(text) = rendered {
        out.write(&text)?;
    }
    Ok(())
}

fn format_currency(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let (dollars, remainder) = (cents / 100, cents % 100);

    let digits = dollars.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    if remainder == 0 {
        format!("{sign}${grouped}")
    } else {
        format!("{sign}${grouped}.{remainder:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{ImageSlot, Package};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::io::Write;

    fn context() -> RenderContext {
        let valuation = Package::from_value(json!({
            "id": 42,
            "property": { "name": "Maple Court", "address": "1 Main St", "city": "Springfield" },
            "property_units": [{
                "unit_type": "2BR",
                "units": 2,
                "monthly_rent": 1250,
                "total_monthly_rent": 2500,
                "annual_rent": 30000
            }],
            "property_map_url": "https://maps.test/p.png"
        }))
        .expect("object");

        let mut images = BTreeMap::new();
        images.insert(ImageSlot::CoverPage, "http://x/cover.png".to_string());

        RenderContext {
            valuation,
            user: json!({
                "first_name": "Dana",
                "last_name": "Reyes",
                "email": "dana@example.com"
            }),
            images,
        }
    }

    #[test]
    fn index_view_shows_package_and_present_images() {
        let renderer = HandlebarsRenderer::embedded().expect("embedded templates compile");
        let html = renderer.render(INDEX_VIEW, &context()).expect("renders");

        assert!(html.contains("Maple Court"));
        assert!(html.contains("http://x/cover.png"));
        assert!(html.contains("$30,000"));
        assert!(html.contains("https://maps.test/p.png"));
        assert!(html.contains("Dana"));
        assert!(html.contains(r#"data-image-id="photo-1""#));
        assert!(!html.contains("http://x/photo"));
    }

    #[test]
    fn unknown_view_is_rejected() {
        let renderer = HandlebarsRenderer::embedded().expect("embedded templates compile");
        assert!(matches!(
            renderer.render("summary", &context()),
            Err(RenderError::UnknownView(view)) if view == "summary"
        ));
    }

    #[test]
    fn template_path_replaces_index() {
        let name = format!("valuation-index-{}.hbs", std::process::id());
        let path = std::env::temp_dir().join(name);
        let mut file = std::fs::File::create(&path).expect("temp template");
        write!(file, "<p>{{{{valuation.property.name}}}} for {{{{user.first_name}}}}</p>")
            .expect("template written");

        let renderer =
            HandlebarsRenderer::from_template_path(Some(&path)).expect("template loads");
        let html = renderer.render(INDEX_VIEW, &context()).expect("renders");
        std::fs::remove_file(&path).ok();

        assert_eq!(html, "<p>Maple Court for Dana</p>");
    }

    #[test]
    fn missing_template_file_fails_to_load() {
        let missing = Path::new("/nonexistent/valuation/index.hbs");
        assert!(matches!(
            HandlebarsRenderer::from_template_path(Some(missing)),
            Err(RenderError::Template(_))
        ));
    }

    #[test]
    fn currency_groups_thousands_and_keeps_cents() {
        assert_eq!(format_currency(0.0), "$0");
        assert_eq!(format_currency(950.0), "$950");
        assert_eq!(format_currency(1250.5), "$1,250.50");
        assert_eq!(format_currency(1234567.0), "$1,234,567");
        assert_eq!(format_currency(-2000.0), "-$2,000");
    }
}
