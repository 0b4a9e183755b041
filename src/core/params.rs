use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::grid::DggRaster;
use crate::error::Result;

/// Rendering parameters suitable for config files
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderParams {
    /// Level-0 raster width in pixels (height is half)
    pub raster_width: usize,
    pub raster_levels: usize,
    pub raster_tile_size: usize,
    /// Grid-id raster tiles kept in the LRU cache
    pub raster_cache_tiles: usize,
    /// Reuse values of neighbouring pixels mapping to the same cell
    pub neighbor_cache: bool,
    pub no_data_f32: f32,
    pub no_data_int: i32,
    /// Directory of schema JSON files overriding the bundled ones
    pub schema_dir: Option<PathBuf>,
    pub descriptor_dir: Option<PathBuf>,
}

impl Default for RenderParams {
    fn default() -> Self {
        Self {
            raster_width: DggRaster::DEFAULT_WIDTH,
            raster_levels: DggRaster::DEFAULT_LEVELS,
            raster_tile_size: DggRaster::DEFAULT_TILE_SIZE,
            raster_cache_tiles: DggRaster::DEFAULT_CACHE_TILES,
            neighbor_cache: true,
            no_data_f32: -999.0,
            no_data_int: 0,
            schema_dir: None,
            descriptor_dir: None,
        }
    }
}

impl RenderParams {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn build_raster(&self) -> Result<DggRaster> {
        DggRaster::new(
            self.raster_width,
            self.raster_levels,
            self.raster_tile_size,
            self.raster_cache_tiles,
        )
    }
}

/// Export parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExportParams {
    /// Write the derived 42.5° brightness temperatures in text exports
    pub derived_columns: bool,
    /// Text used for values that cannot be produced
    pub no_data_text: String,
    pub schema_dir: Option<PathBuf>,
    pub descriptor_dir: Option<PathBuf>,
}

impl Default for ExportParams {
    fn default() -> Self {
        Self {
            derived_columns: true,
            no_data_text: "NaN".to_string(),
            schema_dir: None,
            descriptor_dir: None,
        }
    }
}

impl ExportParams {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}
