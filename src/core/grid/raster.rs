//! Multi-resolution grid-id raster: global plate-carrée pixels mapped to the
//! seqnum of the cell holding the pixel centre.
//!
//! Level 0 is `width0 × width0/2` pixels; each further level halves both
//! dimensions. Raster tiles are generated on first use and kept in an LRU
//! cache shared by every band and product rendered through the same raster.
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use ndarray::{Array2, s};
use tracing::debug;

use crate::error::{Error, Result};

use super::dgg::{column, lat_band, seqnum_of};
use super::region::GeoRect;

/// Pixel rectangle at one level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelRect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl PixelRect {
    pub const fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self { x, y, width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn right(&self) -> usize {
        self.x + self.width
    }

    pub fn bottom(&self) -> usize {
        self.y + self.height
    }
}

/// Pixel grid of one level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelGeometry {
    pub width: usize,
    pub height: usize,
}

impl LevelGeometry {
    pub fn pixel_size(&self) -> f64 {
        360.0 / self.width as f64
    }

    /// Longitude of the centre of pixel column `x`.
    pub fn pixel_lon(&self, x: usize) -> f64 {
        -180.0 + (x as f64 + 0.5) * 360.0 / self.width as f64
    }

    /// Latitude of the centre of pixel row `y` (row 0 at the north).
    pub fn pixel_lat(&self, y: usize) -> f64 {
        90.0 - (y as f64 + 0.5) * 180.0 / self.height as f64
    }

    pub fn bounds(&self, rect: &PixelRect) -> GeoRect {
        let dx = 360.0 / self.width as f64;
        let dy = 180.0 / self.height as f64;
        GeoRect::new(
            -180.0 + rect.x as f64 * dx,
            90.0 - rect.bottom() as f64 * dy,
            -180.0 + rect.right() as f64 * dx,
            90.0 - rect.y as f64 * dy,
        )
    }

    /// Bounds of one pixel row across `[x0, x1)`.
    pub fn row_bounds(&self, y: usize, x0: usize, x1: usize) -> GeoRect {
        self.bounds(&PixelRect::new(x0, y, x1 - x0, 1))
    }

    pub fn contains(&self, rect: &PixelRect) -> bool {
        rect.right() <= self.width && rect.bottom() <= self.height
    }

    pub fn full_rect(&self) -> PixelRect {
        PixelRect::new(0, 0, self.width, self.height)
    }
}

/// Source of per-pixel seqnums. Seqnum values ≤ 0 mark pixels without a cell.
pub trait GridIdSource: Send + Sync {
    fn level_count(&self) -> usize;

    fn geometry(&self, level: usize) -> Option<LevelGeometry>;

    fn read(&self, rect: &PixelRect, level: usize) -> Result<Array2<i32>>;
}

type TileKey = (usize, usize, usize);

/// Grid-id raster of the discrete global grid
pub struct DggRaster {
    width0: usize,
    levels: usize,
    tile_size: usize,
    cache: Mutex<LruCache<TileKey, Arc<Array2<i32>>>>,
}

impl DggRaster {
    pub const DEFAULT_WIDTH: usize = 16384;
    pub const DEFAULT_LEVELS: usize = 7;
    pub const DEFAULT_TILE_SIZE: usize = 512;
    pub const DEFAULT_CACHE_TILES: usize = 256;

    pub fn new(width0: usize, levels: usize, tile_size: usize, cache_tiles: usize) -> Result<Self> {
        if width0 < 2 || width0 % 2 != 0 {
            return Err(Error::InvalidArgument {
                arg: "raster_width",
                value: width0.to_string(),
            });
        }
        let coarsest = levels
            .checked_sub(1)
            .and_then(|shift| u32::try_from(shift).ok())
            .and_then(|shift| width0.checked_shr(shift));
        if !matches!(coarsest, Some(w) if w >= 2) {
            return Err(Error::InvalidArgument {
                arg: "raster_levels",
                value: levels.to_string(),
            });
        }
        if tile_size == 0 {
            return Err(Error::InvalidArgument {
                arg: "raster_tile_size",
                value: tile_size.to_string(),
            });
        }
        let capacity = NonZeroUsize::new(cache_tiles.max(1)).unwrap_or(NonZeroUsize::MIN);
        Ok(Self {
            width0,
            levels,
            tile_size,
            cache: Mutex::new(LruCache::new(capacity)),
        })
    }

    pub fn tile_size(&self) -> usize {
        self.tile_size
    }

    fn cached(&self, key: &TileKey) -> Option<Arc<Array2<i32>>> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.get(key).cloned()
    }

    /// Cached raster tile; generated outside the cache lock on a miss.
    fn tile(&self, level: usize, geom: &LevelGeometry, tx: usize, ty: usize) -> Arc<Array2<i32>> {
        let key = (level, tx, ty);
        if let Some(tile) = self.cached(&key) {
            return tile;
        }
        let x0 = tx * self.tile_size;
        let y0 = ty * self.tile_size;
        let w = self.tile_size.min(geom.width - x0);
        let h = self.tile_size.min(geom.height - y0);
        let cols: Vec<u32> = (0..w).map(|c| column(geom.pixel_lon(x0 + c))).collect();
        let mut tile = Array2::<i32>::zeros((h, w));
        for (r, mut row) in tile.rows_mut().into_iter().enumerate() {
            let band = lat_band(geom.pixel_lat(y0 + r));
            for (v, col) in row.iter_mut().zip(&cols) {
                *v = seqnum_of(band, *col);
            }
        }
        debug!("Generated grid-id tile level={} tx={} ty={} ({}x{})", level, tx, ty, w, h);
        let tile = Arc::new(tile);
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        // another reader may have generated the same tile meanwhile
        cache.get_or_insert(key, || tile).clone()
    }

    /// Raster tiles currently held by the cache.
    pub fn cached_tiles(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or_else(|e| e.into_inner().len())
    }
}

impl Default for DggRaster {
    fn default() -> Self {
        Self {
            width0: Self::DEFAULT_WIDTH,
            levels: Self::DEFAULT_LEVELS,
            tile_size: Self::DEFAULT_TILE_SIZE,
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(Self::DEFAULT_CACHE_TILES).unwrap_or(NonZeroUsize::MIN),
            )),
        }
    }
}

impl GridIdSource for DggRaster {
    fn level_count(&self) -> usize {
        self.levels
    }

    fn geometry(&self, level: usize) -> Option<LevelGeometry> {
        if level >= self.levels {
            return None;
        }
        let width = self.width0 >> level;
        Some(LevelGeometry {
            width,
            height: width / 2,
        })
    }

    fn read(&self, rect: &PixelRect, level: usize) -> Result<Array2<i32>> {
        let geom = self.geometry(level).ok_or(Error::InvalidArgument {
            arg: "level",
            value: level.to_string(),
        })?;
        if !geom.contains(rect) {
            return Err(Error::InvalidArgument {
                arg: "rect",
                value: format!("{:?} outside {}x{}", rect, geom.width, geom.height),
            });
        }
        let mut out = Array2::<i32>::zeros((rect.height, rect.width));
        if rect.is_empty() {
            return Ok(out);
        }
        let ts = self.tile_size;
        for ty in rect.y / ts..=(rect.bottom() - 1) / ts {
            for tx in rect.x / ts..=(rect.right() - 1) / ts {
                let tile = self.tile(level, &geom, tx, ty);
                // overlap in level pixel coordinates
                let x0 = rect.x.max(tx * ts);
                let x1 = rect.right().min(tx * ts + tile.ncols());
                let y0 = rect.y.max(ty * ts);
                let y1 = rect.bottom().min(ty * ts + tile.nrows());
                let src = tile.slice(s![y0 - ty * ts..y1 - ty * ts, x0 - tx * ts..x1 - tx * ts]);
                out.slice_mut(s![y0 - rect.y..y1 - rect.y, x0 - rect.x..x1 - rect.x])
                    .assign(&src);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grid::dgg::{SEQNUM_MAX, SEQNUM_MIN, seqnum};

    #[test]
    fn level_geometry() {
        let raster = DggRaster::new(1024, 3, 128, 8).unwrap();
        let g0 = raster.geometry(0).unwrap();
        assert_eq!((g0.width, g0.height), (1024, 512));
        let g2 = raster.geometry(2).unwrap();
        assert_eq!((g2.width, g2.height), (256, 128));
        assert!(raster.geometry(3).is_none());
        assert_eq!(g0.bounds(&g0.full_rect()), GeoRect::GLOBE);
        assert!(DggRaster::new(1000, 12, 128, 8).is_err());
    }

    #[test]
    fn out_of_range_level_counts_are_rejected() {
        for levels in [0, 11, 64, 65, 200, usize::MAX] {
            assert!(DggRaster::new(1024, levels, 128, 8).is_err(), "levels={}", levels);
        }
        assert!(DggRaster::new(1024, 10, 128, 8).is_ok());
    }

    #[test]
    fn parallel_reads_share_cached_tiles() {
        use rayon::prelude::*;

        let raster = DggRaster::new(512, 1, 64, 64).unwrap();
        let rect = PixelRect::new(0, 0, 512, 256);
        let reference = raster.read(&rect, 0).unwrap();
        assert_eq!(raster.cached_tiles(), 32);
        let fresh = DggRaster::new(512, 1, 64, 64).unwrap();
        let reads: Vec<Array2<i32>> = (0..8)
            .into_par_iter()
            .map(|_| fresh.read(&rect, 0).unwrap())
            .collect();

        assert!(reads.iter().all(|r| *r == reference));
        assert_eq!(fresh.cached_tiles(), 32);
    }

    #[test]
    fn pixels_map_to_cell_of_centre() {
        let raster = DggRaster::new(2048, 2, 100, 4).unwrap();
        let g = raster.geometry(0).unwrap();
        let rect = PixelRect::new(950, 0, 200, 230);
        let ids = raster.read(&rect, 0).unwrap();
        assert_eq!(ids.dim(), (230, 200));
        for (r, c) in [(0usize, 0usize), (0, 199), (17, 99), (229, 150), (101, 50)] {
            let expected = seqnum(g.pixel_lon(rect.x + c), g.pixel_lat(rect.y + r));
            assert_eq!(ids[[r, c]], expected);
        }
        assert!(ids.row(0).iter().all(|s| (2..2 + 2048).contains(s)));
        let south = raster.read(&PixelRect::new(0, g.height - 1, 3, 1), 0).unwrap();
        assert!(south.iter().all(|s| *s > SEQNUM_MAX - 2049 && *s < SEQNUM_MAX));
    }

    #[test]
    fn polar_rows_hit_the_caps_at_fine_resolution() {
        let raster = DggRaster::new(65536, 1, 16, 2).unwrap();
        let g = raster.geometry(0).unwrap();
        let north = raster.read(&PixelRect::new(0, 0, 4, 1), 0).unwrap();
        assert!(north.iter().all(|s| *s == SEQNUM_MIN));
        let south = raster.read(&PixelRect::new(100, g.height - 1, 4, 1), 0).unwrap();
        assert!(south.iter().all(|s| *s == SEQNUM_MAX));
    }

    #[test]
    fn reads_across_tiles_match_single_tile_reads() {
        let raster = DggRaster::new(512, 1, 64, 2).unwrap();
        let big = raster.read(&PixelRect::new(10, 20, 150, 100), 0).unwrap();
        let small = raster.read(&PixelRect::new(70, 60, 10, 10), 0).unwrap();
        assert_eq!(big.slice(s![40..50, 60..70]), small);
        assert!(raster.read(&PixelRect::new(500, 0, 20, 1), 0).is_err());
    }
}
