//! Dashboard configuration: boundary sources and choropleth styling.
//!
//! The default configuration is embedded from `dashboard.toml` at compile
//! time. Setting `ACCIDENT_MAP_CONFIG` to a TOML file path replaces it.

use std::path::{Path, PathBuf};

use accident_map_geography_models::Granularity;
use serde::{Deserialize, Serialize};

use crate::GeoError;
use crate::choropleth::ColorScale;

/// Environment variable naming an alternative config file.
pub const CONFIG_PATH_ENV: &str = "ACCIDENT_MAP_CONFIG";

const DEFAULT_CONFIG: &str = include_str!("../dashboard.toml");

/// Where to find the polygons of one granularity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundarySource {
    /// `GeoJSON` file; relative paths resolve against the data directory.
    pub path: PathBuf,
    /// Feature property holding the ISTAT code.
    pub code_property: String,
    /// Feature property holding the unit's own name, if any.
    #[serde(default)]
    pub name_property: Option<String>,
}

/// Boundary sources for both granularities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryConfig {
    /// Region polygons.
    pub region: BoundarySource,
    /// Province polygons.
    pub province: BoundarySource,
}

/// Choropleth colouring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoroplethConfig {
    /// Sequential colour scale.
    pub color_scale: ColorScale,
    /// Number of colour classes (2-9).
    pub classes: u8,
}

impl Default for ChoroplethConfig {
    fn default() -> Self {
        Self {
            color_scale: ColorScale::Reds,
            classes: 5,
        }
    }
}

/// Top-level dashboard configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Boundary files.
    pub boundaries: BoundaryConfig,
    /// Map styling.
    #[serde(default)]
    pub choropleth: ChoroplethConfig,
}

impl DashboardConfig {
    /// Parses a config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::Toml`] if the text is not a valid config.
    pub fn parse(text: &str) -> Result<Self, GeoError> {
        Ok(toml::from_str(text)?)
    }

    /// Returns the embedded default config.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::Toml`] if the embedded file is malformed.
    pub fn embedded() -> Result<Self, GeoError> {
        Self::parse(DEFAULT_CONFIG)
    }

    /// Loads the config named by `ACCIDENT_MAP_CONFIG`, falling back to
    /// the embedded default.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError`] if the file cannot be read or parsed.
    pub fn load() -> Result<Self, GeoError> {
        match std::env::var_os(CONFIG_PATH_ENV).filter(|v| !v.is_empty()) {
            Some(path) => Self::load_file(Path::new(&path)),
            None => Self::embedded(),
        }
    }

    /// Loads a config from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError`] if the file cannot be read or parsed.
    pub fn load_file(path: &Path) -> Result<Self, GeoError> {
        log::info!("Loading dashboard config from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Returns the boundary source of a granularity.
    #[must_use]
    pub const fn source(&self, granularity: Granularity) -> &BoundarySource {
        match granularity {
            Granularity::Region => &self.boundaries.region,
            Granularity::Province => &self.boundaries.province,
        }
    }

    /// Resolves the boundary file path of a granularity.
    #[must_use]
    pub fn boundary_path(&self, granularity: Granularity) -> PathBuf {
        let path = &self.source(granularity).path;
        if path.is_absolute() {
            path.clone()
        } else {
            accident_map_database::paths::data_dir().join(path)
        }
    }
}
