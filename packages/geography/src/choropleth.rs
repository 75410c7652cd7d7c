//! Choropleth specification: joined polygons plus a sequential colour
//! scale.
//!
//! Values are split into equal-width classes between the minimum and
//! maximum joined value; each feature receives the colour of its class in
//! a `fill` property.

use accident_map_accident_models::YearSelection;
use accident_map_geography_models::{AggregationResult, Granularity};
use duckdb::Connection;
use geojson::FeatureCollection;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::GeoError;
use crate::aggregate::aggregate;
use crate::boundaries::{Boundaries, BoundaryPolygon, to_feature_collection};
use crate::config::ChoroplethConfig;
use crate::geojoin::{attach, value_of};

/// Property holding the feature's fill colour.
pub const FILL_PROPERTY: &str = "fill";
/// Property holding the feature's class index.
pub const CLASS_PROPERTY: &str = "class";

/// Sequential `ColorBrewer` palettes, light to dark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScale {
    /// White to dark red.
    Reds,
    /// White to dark blue.
    Blues,
    /// White to dark orange.
    Oranges,
    /// White to dark green.
    Greens,
}

impl ColorScale {
    const fn palette(self) -> &'static [&'static str; 9] {
        match self {
            Self::Reds => &[
                "#fff5f0", "#fee0d2", "#fcbba1", "#fc9272", "#fb6a4a", "#ef3b2c", "#cb181d",
                "#a50f15", "#67000d",
            ],
            Self::Blues => &[
                "#f7fbff", "#deebf7", "#c6dbef", "#9ecae1", "#6baed6", "#4292c6", "#2171b5",
                "#08519c", "#08306b",
            ],
            Self::Oranges => &[
                "#fff5eb", "#fee6ce", "#fdd0a2", "#fdae6b", "#fd8d3c", "#f16913", "#d94801",
                "#a63603", "#7f2704",
            ],
            Self::Greens => &[
                "#f7fcf5", "#e5f5e0", "#c7e9c0", "#a1d99b", "#74c476", "#41ab5d", "#238b45",
                "#006d2c", "#00441b",
            ],
        }
    }

    /// Returns `classes` colours spread evenly over the palette.
    ///
    /// `classes` is clamped to 2-9.
    #[must_use]
    pub fn colors(self, classes: u8) -> Vec<&'static str> {
        let palette = self.palette();
        let k = usize::from(classes.clamp(2, 9));
        let last = palette.len() - 1;
        (0..k)
            .map(|i| palette[(i * last + (k - 1) / 2) / (k - 1)])
            .collect()
    }
}

/// One legend entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorClass {
    /// Inclusive lower bound.
    pub lower: f64,
    /// Upper bound (inclusive for the last class).
    pub upper: f64,
    /// Fill colour.
    pub color: String,
    /// Legend text, one decimal.
    pub label: String,
}

/// Everything a map renderer needs to draw one choropleth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoroplethSpec {
    /// Unit kind shown.
    pub granularity: Granularity,
    /// Title of the value axis.
    pub value_label: String,
    /// Years shown, e.g. `"2021"` or `"Average 2019-2023"`.
    pub caption: String,
    /// Smallest joined value.
    pub min: f64,
    /// Largest joined value.
    pub max: f64,
    /// Colour classes, lowest first.
    pub classes: Vec<ColorClass>,
    /// Joined polygons with `fill` and `class` properties.
    pub features: FeatureCollection,
}

impl ChoroplethSpec {
    /// Builds a choropleth from joined polygons.
    #[must_use]
    pub fn build(
        result: &AggregationResult,
        caption: impl Into<String>,
        enriched: Vec<BoundaryPolygon>,
        config: &ChoroplethConfig,
    ) -> Self {
        let values: Vec<f64> = enriched.iter().map(value_of).collect();
        let (min, max) = values
            .iter()
            .copied()
            .fold(None, |acc: Option<(f64, f64)>, v| {
                Some(acc.map_or((v, v), |(lo, hi)| (lo.min(v), hi.max(v))))
            })
            .unwrap_or((0.0, 0.0));

        let colors = config.color_scale.colors(config.classes);
        let classes = legend(min, max, &colors);

        let colored: Vec<BoundaryPolygon> = enriched
            .into_iter()
            .zip(values)
            .map(|(mut polygon, value)| {
                let class = class_index(value, min, max, colors.len());
                polygon.properties.insert(
                    FILL_PROPERTY.to_string(),
                    Value::String(colors[class].to_string()),
                );
                polygon
                    .properties
                    .insert(CLASS_PROPERTY.to_string(), Value::from(class));
                polygon
            })
            .collect();

        Self {
            granularity: result.granularity,
            value_label: result.value_label().to_string(),
            caption: caption.into(),
            min,
            max,
            classes,
            features: to_feature_collection(&colored),
        }
    }
}

/// Runs the whole map pipeline: aggregate, join onto the boundaries of
/// `granularity`, then colour.
///
/// # Errors
///
/// Returns [`GeoError`] if the aggregation query fails.
pub fn render(
    conn: &Connection,
    boundaries: &Boundaries,
    config: &ChoroplethConfig,
    granularity: Granularity,
    years: &YearSelection,
    normalize: bool,
) -> Result<ChoroplethSpec, GeoError> {
    let result = aggregate(conn, granularity, years, normalize)?;
    let enriched = attach(&result, boundaries.get(granularity).polygons());
    Ok(ChoroplethSpec::build(
        &result,
        years.display_text(),
        enriched,
        config,
    ))
}

/// Index of the equal-width class `value` falls into.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn class_index(value: f64, min: f64, max: f64, classes: usize) -> usize {
    if classes == 0 {
        return 0;
    }
    let span = max - min;
    if span <= 0.0 || !value.is_finite() {
        return 0;
    }
    let position = ((value - min) / span * classes as f64).floor();
    (position.max(0.0) as usize).min(classes - 1)
}

#[allow(clippy::cast_precision_loss)]
fn legend(min: f64, max: f64, colors: &[&str]) -> Vec<ColorClass> {
    let k = colors.len() as f64;
    let width = (max - min) / k;
    colors
        .iter()
        .enumerate()
        .map(|(i, color)| {
            let lower = (i as f64).mul_add(width, min);
            let upper = if i + 1 == colors.len() {
                max
            } else {
                ((i + 1) as f64).mul_add(width, min)
            };
            ColorClass {
                lower,
                upper,
                color: (*color).to_string(),
                label: format!("{lower:.1} - {upper:.1}"),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use accident_map_database::store;

    use super::*;
    use crate::aggregate::tests::{record, seeded, years};
    use crate::boundaries::tests::boundaries;

    #[test]
    fn palette_sampling_keeps_ends() {
        let five = ColorScale::Reds.colors(5);
        assert_eq!(five.len(), 5);
        assert_eq!(five[0], "#fff5f0");
        assert_eq!(five[4], "#67000d");

        let nine = ColorScale::Blues.colors(9);
        assert_eq!(nine.len(), 9);
        assert_eq!(ColorScale::Greens.colors(1).len(), 2);
        assert_eq!(ColorScale::Oranges.colors(20).len(), 9);
    }

    #[test]
    fn class_bounds() {
        assert_eq!(class_index(0.0, 0.0, 10.0, 5), 0);
        assert_eq!(class_index(1.99, 0.0, 10.0, 5), 0);
        assert_eq!(class_index(2.0, 0.0, 10.0, 5), 1);
        assert_eq!(class_index(10.0, 0.0, 10.0, 5), 4);
        assert_eq!(class_index(3.0, 3.0, 3.0, 5), 0);
        assert_eq!(class_index(f64::NAN, 0.0, 1.0, 5), 0);
    }

    #[test]
    fn legend_covers_range() {
        let classes = legend(0.0, 10.0, &["a", "b"]);
        assert_eq!(classes.len(), 2);
        assert_eq!(classes[0].label, "0.0 - 5.0");
        assert!((classes[1].upper - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn spec_colors_every_feature() {
        let conn = seeded();
        store::insert_accidents(&conn, &[record(19, 1), record(19, 1), record(19, 7)]).unwrap();
        let selection = years(&[19]);
        let result = aggregate(&conn, Granularity::Region, &selection, false).unwrap();
        let enriched = attach(&result, boundaries().get(Granularity::Region).polygons());

        let spec = ChoroplethSpec::build(
            &result,
            selection.display_text(),
            enriched,
            &ChoroplethConfig::default(),
        );
        assert_eq!(spec.caption, "2019");
        assert!(spec.min.abs() < f64::EPSILON);
        assert!((spec.max - 2.0).abs() < f64::EPSILON);
        assert_eq!(spec.features.features.len(), 3);

        let fills: Vec<&str> = spec
            .features
            .features
            .iter()
            .map(|f| f.properties.as_ref().unwrap()[FILL_PROPERTY].as_str().unwrap())
            .collect();
        assert_eq!(fills, vec!["#67000d", "#fb6a4a", "#fff5f0"]);
    }

    #[test]
    fn render_runs_the_pipeline() {
        let conn = seeded();
        store::insert_accidents(&conn, &[record(19, 1), record(20, 7), record(20, 7)]).unwrap();

        let spec = render(
            &conn,
            &boundaries(),
            &ChoroplethConfig::default(),
            Granularity::Province,
            &years(&[19, 20]),
            false,
        )
        .unwrap();
        assert_eq!(spec.granularity, Granularity::Province);
        assert_eq!(spec.caption, "Average 2019-2020");
        assert_eq!(spec.value_label, "Incidents");
        assert!((spec.max - 1.0).abs() < f64::EPSILON);
        assert_eq!(spec.features.features.len(), 3);
    }
}
