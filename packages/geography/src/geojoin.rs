//! Joins aggregated values onto boundary polygons.

use accident_map_geography_models::AggregationResult;
use serde_json::Value;

use crate::boundaries::BoundaryPolygon;

/// Property holding the polygon's canonical code.
pub const CODE_PROPERTY: &str = "code";
/// Property holding the unit's display name.
pub const NAME_PROPERTY: &str = "display_name";
/// Property holding the displayed value.
pub const VALUE_PROPERTY: &str = "value";
/// Property holding the raw (possibly averaged) count.
pub const RAW_COUNT_PROPERTY: &str = "raw_count";
/// Display name for polygons without a matching unit.
pub const MISSING_NAME: &str = "N/A";

/// Returns a copy of every polygon with the code, display name and value
/// of its unit written into its properties.
///
/// Polygons whose code has no entry in `result` get the name `"N/A"` and
/// value `0`. The output has exactly one polygon per input polygon, in
/// the same order.
#[must_use]
pub fn attach(result: &AggregationResult, polygons: &[BoundaryPolygon]) -> Vec<BoundaryPolygon> {
    let mut unmatched = 0usize;

    let enriched: Vec<BoundaryPolygon> = polygons
        .iter()
        .map(|polygon| {
            let mut polygon = polygon.clone();
            let entry = result.entries.get(&polygon.code);

            let (name, value, raw) = entry.map_or_else(
                || {
                    unmatched += 1;
                    log::debug!(
                        "No aggregated data for boundary {} ({})",
                        polygon.code,
                        polygon.source_name.as_deref().unwrap_or("unnamed")
                    );
                    (MISSING_NAME.to_string(), 0.0, 0.0)
                },
                |v| (v.name.clone(), v.value(result.normalize), v.raw_count),
            );

            let props = &mut polygon.properties;
            props.insert(
                CODE_PROPERTY.to_string(),
                Value::String(polygon.code.to_string()),
            );
            props.insert(NAME_PROPERTY.to_string(), Value::String(name));
            props.insert(VALUE_PROPERTY.to_string(), json_number(value));
            props.insert(RAW_COUNT_PROPERTY.to_string(), json_number(raw));
            polygon
        })
        .collect();

    if unmatched > 0 {
        log::debug!(
            "{unmatched} of {} {} boundaries had no data",
            polygons.len(),
            result.granularity
        );
    }

    enriched
}

fn json_number(v: f64) -> Value {
    serde_json::Number::from_f64(v).map_or(Value::from(0), Value::Number)
}

/// Reads the joined value back from an enriched polygon.
#[must_use]
pub fn value_of(polygon: &BoundaryPolygon) -> f64 {
    polygon
        .properties
        .get(VALUE_PROPERTY)
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use accident_map_database::store;
    use accident_map_geography_models::Granularity;

    use super::*;
    use crate::aggregate::aggregate;
    use crate::aggregate::tests::{record, seeded, years};
    use crate::boundaries::tests::boundaries;

    #[test]
    fn every_polygon_appears_once() {
        let conn = seeded();
        store::insert_accidents(&conn, &[record(19, 1)]).unwrap();
        let b = boundaries();

        for granularity in [Granularity::Region, Granularity::Province] {
            let result = aggregate(&conn, granularity, &years(&[19]), false).unwrap();
            let polygons = b.get(granularity).polygons();
            let enriched = attach(&result, polygons);
            assert_eq!(enriched.len(), polygons.len());
            for (a, b) in enriched.iter().zip(polygons) {
                assert_eq!(a.code, b.code);
            }
        }
    }

    #[test]
    fn integer_keyed_polygons_match_aggregates() {
        let conn = seeded();
        store::insert_accidents(&conn, &[record(19, 1), record(19, 1), record(19, 7)]).unwrap();
        let result = aggregate(&conn, Granularity::Province, &years(&[19]), false).unwrap();
        let enriched = attach(&result, boundaries().get(Granularity::Province).polygons());

        let values: Vec<f64> = enriched.iter().map(value_of).collect();
        assert_eq!(values, vec![2.0, 0.0, 1.0]);
        assert_eq!(enriched[0].properties[NAME_PROPERTY], "Torino");
        assert_eq!(enriched[0].properties[CODE_PROPERTY], "001");
    }

    #[test]
    fn unmatched_polygon_gets_fallback() {
        let conn = seeded();
        store::insert_accidents(&conn, &[record(19, 1)]).unwrap();
        let result = aggregate(&conn, Granularity::Region, &years(&[19]), false).unwrap();
        let enriched = attach(&result, boundaries().get(Granularity::Region).polygons());

        let lombardia = &enriched[2];
        assert_eq!(lombardia.properties[NAME_PROPERTY], MISSING_NAME);
        assert!(value_of(lombardia).abs() < f64::EPSILON);
        assert_eq!(enriched[0].properties[NAME_PROPERTY], "Piemonte");
        assert!((value_of(&enriched[0]) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn normalized_values_are_joined() {
        let conn = seeded();
        store::insert_accidents(&conn, &[record(19, 7)]).unwrap();
        let result = aggregate(&conn, Granularity::Province, &years(&[19]), true).unwrap();
        let enriched = attach(&result, boundaries().get(Granularity::Province).polygons());
        let aosta = &enriched[2];
        assert!((value_of(aosta) - 1.0 / 125_000.0 * 100_000.0).abs() < 1e-12);
        assert_eq!(aosta.properties[RAW_COUNT_PROPERTY], 1.0);
    }

    #[test]
    fn input_polygons_are_untouched() {
        let conn = seeded();
        let result = aggregate(&conn, Granularity::Region, &years(&[19]), false).unwrap();
        let b = boundaries();
        let polygons = b.get(Granularity::Region).polygons();
        let _ = attach(&result, polygons);
        assert!(!polygons[0].properties.contains_key(VALUE_PROPERTY));
    }
}
