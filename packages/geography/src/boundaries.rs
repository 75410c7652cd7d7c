//! Region and province boundary polygons.
//!
//! Boundary files are `GeoJSON` feature collections whose features carry
//! the ISTAT code in a configurable property. The code is converted to its
//! canonical [`GeoCode`] when the file is loaded, whatever its source
//! representation (`1`, `"1"`, `"01"`). A file that cannot be parsed, or
//! a feature without a usable code or polygon geometry, fails the whole
//! load.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use accident_map_geography_models::{CodeRepr, GeoCode, Granularity};
use geo::{BoundingRect, MultiPolygon};
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject};

use crate::GeoError;
use crate::config::{BoundarySource, DashboardConfig};

/// A static shape keyed by its administrative code.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryPolygon {
    /// Canonical code of the unit this shape outlines.
    pub code: GeoCode,
    /// Name recorded in the boundary file itself, if configured.
    pub source_name: Option<String>,
    /// Original `GeoJSON` geometry, kept for re-serialization.
    pub geometry: geojson::Geometry,
    /// Parsed shape.
    pub shape: MultiPolygon<f64>,
    /// Feature properties; enriched by the geo-join.
    pub properties: JsonObject,
}

impl BoundaryPolygon {
    /// Bounding box as `[min_x, min_y, max_x, max_y]`.
    #[must_use]
    pub fn bbox(&self) -> Option<[f64; 4]> {
        self.shape
            .bounding_rect()
            .map(|r| [r.min().x, r.min().y, r.max().x, r.max().y])
    }

    /// Converts back into a `GeoJSON` feature.
    #[must_use]
    pub fn to_feature(&self) -> Feature {
        Feature {
            bbox: None,
            geometry: Some(self.geometry.clone()),
            id: Some(geojson::feature::Id::String(self.code.to_string())),
            properties: Some(self.properties.clone()),
            foreign_members: None,
        }
    }
}

/// All polygons of one granularity.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryCollection {
    granularity: Granularity,
    polygons: Vec<BoundaryPolygon>,
}

impl BoundaryCollection {
    /// Loads a boundary file.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError`] if the file cannot be read or is not a usable
    /// feature collection.
    pub fn load(
        path: &Path,
        granularity: Granularity,
        source: &BoundarySource,
    ) -> Result<Self, GeoError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            GeoError::boundary(format!("cannot read {}: {e}", path.display()))
        })?;
        let collection = Self::parse(&text, granularity, source)?;
        log::info!(
            "Loaded {} {granularity} boundaries from {}",
            collection.len(),
            path.display()
        );
        Ok(collection)
    }

    /// Parses boundary `GeoJSON` text.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError`] if the text is not a usable feature collection.
    pub fn parse(
        text: &str,
        granularity: Granularity,
        source: &BoundarySource,
    ) -> Result<Self, GeoError> {
        let GeoJson::FeatureCollection(fc) = text.parse::<GeoJson>()? else {
            return Err(GeoError::boundary("expected a FeatureCollection"));
        };

        let mut seen = BTreeSet::new();
        let mut polygons = Vec::with_capacity(fc.features.len());

        for (index, feature) in fc.features.into_iter().enumerate() {
            let polygon = parse_feature(index, feature, granularity, source)?;
            if !seen.insert(polygon.code) {
                return Err(GeoError::boundary(format!(
                    "duplicate {granularity} code {} at feature {index}",
                    polygon.code
                )));
            }
            polygons.push(polygon);
        }

        Ok(Self {
            granularity,
            polygons,
        })
    }

    /// Granularity of the polygons.
    #[must_use]
    pub const fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Polygons in file order.
    #[must_use]
    pub fn polygons(&self) -> &[BoundaryPolygon] {
        &self.polygons
    }

    /// Number of polygons.
    #[must_use]
    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    /// Whether the collection holds no polygons.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    /// Bounding box of the whole collection as
    /// `[min_x, min_y, max_x, max_y]`.
    #[must_use]
    pub fn bbox(&self) -> Option<[f64; 4]> {
        self.polygons
            .iter()
            .filter_map(BoundaryPolygon::bbox)
            .reduce(|a, b| {
                [
                    a[0].min(b[0]),
                    a[1].min(b[1]),
                    a[2].max(b[2]),
                    a[3].max(b[3]),
                ]
            })
    }
}

fn parse_feature(
    index: usize,
    feature: Feature,
    granularity: Granularity,
    source: &BoundarySource,
) -> Result<BoundaryPolygon, GeoError> {
    let properties = feature.properties.unwrap_or_default();

    let raw_code = properties.get(&source.code_property).ok_or_else(|| {
        GeoError::boundary(format!(
            "feature {index} has no '{}' property",
            source.code_property
        ))
    })?;
    let repr: CodeRepr = serde_json::from_value(raw_code.clone()).map_err(|_| {
        GeoError::boundary(format!("feature {index} has a non-scalar code {raw_code}"))
    })?;
    let code = match granularity {
        Granularity::Region => repr.try_into().map(GeoCode::Region),
        Granularity::Province => repr.try_into().map(GeoCode::Province),
    }
    .map_err(|e| GeoError::boundary(format!("feature {index}: {e}")))?;

    let source_name = source
        .name_property
        .as_ref()
        .and_then(|key| properties.get(key))
        .and_then(|v| v.as_str())
        .map(ToString::to_string);

    let geometry = feature
        .geometry
        .ok_or_else(|| GeoError::boundary(format!("feature {index} ({code}) has no geometry")))?;

    let shape = match geo::Geometry::<f64>::try_from(geometry.clone()) {
        Ok(geo::Geometry::MultiPolygon(mp)) => mp,
        Ok(geo::Geometry::Polygon(p)) => MultiPolygon(vec![p]),
        Ok(_) => {
            return Err(GeoError::boundary(format!(
                "feature {index} ({code}) is not a polygon"
            )));
        }
        Err(e) => {
            return Err(GeoError::boundary(format!(
                "feature {index} ({code}) has invalid geometry: {e}"
            )));
        }
    };

    Ok(BoundaryPolygon {
        code,
        source_name,
        geometry,
        shape,
        properties,
    })
}

/// Region and province boundaries, loaded once and shared read-only.
#[derive(Debug, Clone)]
pub struct Boundaries {
    region: Arc<BoundaryCollection>,
    province: Arc<BoundaryCollection>,
}

impl Boundaries {
    /// Wraps already-parsed collections.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::Boundary`] if a collection has the wrong
    /// granularity.
    pub fn new(region: BoundaryCollection, province: BoundaryCollection) -> Result<Self, GeoError> {
        if region.granularity() != Granularity::Region
            || province.granularity() != Granularity::Province
        {
            return Err(GeoError::boundary("collections passed in the wrong order"));
        }
        Ok(Self {
            region: Arc::new(region),
            province: Arc::new(province),
        })
    }

    /// Loads both boundary files named by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError`] if either file is missing or malformed.
    pub fn load(config: &DashboardConfig) -> Result<Self, GeoError> {
        let region = BoundaryCollection::load(
            &config.boundary_path(Granularity::Region),
            Granularity::Region,
            config.source(Granularity::Region),
        )?;
        let province = BoundaryCollection::load(
            &config.boundary_path(Granularity::Province),
            Granularity::Province,
            config.source(Granularity::Province),
        )?;
        Self::new(region, province)
    }

    /// Returns the collection of a granularity.
    #[must_use]
    pub fn get(&self, granularity: Granularity) -> &BoundaryCollection {
        match granularity {
            Granularity::Region => &self.region,
            Granularity::Province => &self.province,
        }
    }
}

/// Builds a feature collection from polygons, with the overall bbox.
#[must_use]
pub fn to_feature_collection(polygons: &[BoundaryPolygon]) -> FeatureCollection {
    let bbox = polygons
        .iter()
        .filter_map(BoundaryPolygon::bbox)
        .reduce(|a, b| {
            [
                a[0].min(b[0]),
                a[1].min(b[1]),
                a[2].max(b[2]),
                a[3].max(b[3]),
            ]
        })
        .map(|b| b.to_vec());

    FeatureCollection {
        bbox,
        features: polygons.iter().map(BoundaryPolygon::to_feature).collect(),
        foreign_members: None,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::path::PathBuf;

    use accident_map_geography_models::{ProvinceCode, RegionCode};

    use super::*;

    pub fn square(x: f64, y: f64) -> serde_json::Value {
        serde_json::json!({
            "type": "Polygon",
            "coordinates": [[[x, y], [x + 1.0, y], [x + 1.0, y + 1.0], [x, y + 1.0], [x, y]]]
        })
    }

    pub fn region_source() -> BoundarySource {
        BoundarySource {
            path: PathBuf::from("regions.geojson"),
            code_property: "reg_istat_code".to_string(),
            name_property: Some("reg_name".to_string()),
        }
    }

    pub fn province_source() -> BoundarySource {
        BoundarySource {
            path: PathBuf::from("provinces.geojson"),
            code_property: "prov_istat_code_num".to_string(),
            name_property: None,
        }
    }

    /// Regions 01, 02 and 03 (the last has no accident data in tests).
    pub fn regions_geojson() -> String {
        serde_json::json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {"reg_istat_code": "01", "reg_name": "Piemonte"}, "geometry": square(7.0, 44.0)},
                {"type": "Feature", "properties": {"reg_istat_code": "02", "reg_name": "Valle d'Aosta"}, "geometry": square(7.0, 45.5)},
                {"type": "Feature", "properties": {"reg_istat_code": "03", "reg_name": "Lombardia"}, "geometry": square(9.0, 45.0)}
            ]
        })
        .to_string()
    }

    /// Provinces keyed by integer codes, as in the ISTAT province file.
    pub fn provinces_geojson() -> String {
        serde_json::json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {"prov_istat_code_num": 1}, "geometry": square(7.0, 45.0)},
                {"type": "Feature", "properties": {"prov_istat_code_num": 2}, "geometry": square(8.0, 45.0)},
                {"type": "Feature", "properties": {"prov_istat_code_num": 7}, "geometry": square(7.0, 45.5)}
            ]
        })
        .to_string()
    }

    pub fn boundaries() -> Boundaries {
        Boundaries::new(
            BoundaryCollection::parse(&regions_geojson(), Granularity::Region, &region_source())
                .unwrap(),
            BoundaryCollection::parse(
                &provinces_geojson(),
                Granularity::Province,
                &province_source(),
            )
            .unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn codes_are_canonicalized_at_load() {
        let b = boundaries();
        let provinces: Vec<GeoCode> = b
            .get(Granularity::Province)
            .polygons()
            .iter()
            .map(|p| p.code)
            .collect();
        assert_eq!(
            provinces,
            vec![
                GeoCode::Province(ProvinceCode::new(1).unwrap()),
                GeoCode::Province(ProvinceCode::new(2).unwrap()),
                GeoCode::Province(ProvinceCode::new(7).unwrap()),
            ]
        );
        let first = &b.get(Granularity::Region).polygons()[0];
        assert_eq!(first.code, GeoCode::Region(RegionCode::new(1).unwrap()));
        assert_eq!(first.source_name.as_deref(), Some("Piemonte"));
    }

    #[test]
    fn collection_bbox_covers_all_polygons() {
        let b = boundaries();
        let bbox = b.get(Granularity::Region).bbox().unwrap();
        assert_eq!(bbox, [7.0, 44.0, 10.0, 46.5]);
    }

    #[test]
    fn rejects_non_collection() {
        let err = BoundaryCollection::parse(
            &square(0.0, 0.0).to_string(),
            Granularity::Region,
            &region_source(),
        )
        .unwrap_err();
        assert!(matches!(err, GeoError::Boundary { .. }));
    }

    #[test]
    fn rejects_malformed_json() {
        let err =
            BoundaryCollection::parse("{not json", Granularity::Region, &region_source()).unwrap_err();
        assert!(matches!(err, GeoError::GeoJson(_)));
    }

    #[test]
    fn rejects_missing_code_property() {
        let text = serde_json::json!({
            "type": "FeatureCollection",
            "features": [{"type": "Feature", "properties": {"name": "x"}, "geometry": square(0.0, 0.0)}]
        })
        .to_string();
        let err = BoundaryCollection::parse(&text, Granularity::Region, &region_source()).unwrap_err();
        assert!(matches!(err, GeoError::Boundary { .. }));
    }

    #[test]
    fn rejects_duplicate_codes() {
        let text = serde_json::json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {"reg_istat_code": 1}, "geometry": square(0.0, 0.0)},
                {"type": "Feature", "properties": {"reg_istat_code": "01"}, "geometry": square(1.0, 0.0)}
            ]
        })
        .to_string();
        let err = BoundaryCollection::parse(&text, Granularity::Region, &region_source()).unwrap_err();
        assert!(matches!(err, GeoError::Boundary { .. }));
    }

    #[test]
    fn rejects_point_geometry() {
        let text = serde_json::json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {"reg_istat_code": 1}, "geometry": {"type": "Point", "coordinates": [0.0, 0.0]}}
            ]
        })
        .to_string();
        let err = BoundaryCollection::parse(&text, Granularity::Region, &region_source()).unwrap_err();
        assert!(matches!(err, GeoError::Boundary { .. }));
    }

    #[test]
    fn missing_file_is_fatal() {
        let err = BoundaryCollection::load(
            Path::new("/nonexistent/regions.geojson"),
            Granularity::Region,
            &region_source(),
        )
        .unwrap_err();
        assert!(matches!(err, GeoError::Boundary { .. }));
    }

    #[test]
    fn boundaries_reject_swapped_collections() {
        let region =
            BoundaryCollection::parse(&regions_geojson(), Granularity::Region, &region_source())
                .unwrap();
        let province = BoundaryCollection::parse(
            &provinces_geojson(),
            Granularity::Province,
            &province_source(),
        )
        .unwrap();
        assert!(Boundaries::new(province, region).is_err());
    }

    #[test]
    fn feature_collection_roundtrip() {
        let b = boundaries();
        let fc = to_feature_collection(b.get(Granularity::Region).polygons());
        assert_eq!(fc.features.len(), 3);
        assert_eq!(fc.bbox, Some(vec![7.0, 44.0, 10.0, 46.5]));
        assert_eq!(
            fc.features[0].id,
            Some(geojson::feature::Id::String("01".to_string()))
        );
    }
}
