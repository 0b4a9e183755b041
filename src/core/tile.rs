//! Tile materialization: grid-id raster + value accessor → typed tile.
//!
//! Pixels are rejected against the valid area coarse to fine (whole tile,
//! scanline, pixel) and filled with no-data without a grid lookup. Inside
//! the area each pixel's seqnum comes from the grid-id raster; the value of
//! the west, north or north-east neighbour is reused when it belongs to the
//! same cell, so every distinct cell is evaluated roughly once per tile.
use std::sync::Arc;

use ndarray::{Array2, s};
use tracing::trace;

use crate::core::grid::{GeoRect, GridIdSource, LevelGeometry, PixelRect, Region};
use crate::core::value::{Sample, ValueAccessor};
use crate::error::{Error, Result};

/// Area outside of which a band has no data
#[derive(Debug, Clone, Default)]
pub enum ValidArea {
    #[default]
    Everywhere,
    /// Envelope of the product's grid points
    Region(Arc<Region>),
    /// Area of one snapshot
    Rect(GeoRect),
}

impl ValidArea {
    pub fn intersects(&self, rect: &GeoRect) -> bool {
        match self {
            ValidArea::Everywhere => true,
            ValidArea::Region(region) => region.intersects(rect),
            ValidArea::Rect(r) => r.intersects(rect),
        }
    }

    pub fn covers(&self, rect: &GeoRect) -> bool {
        match self {
            ValidArea::Everywhere => true,
            ValidArea::Region(region) => region.covers(rect),
            ValidArea::Rect(r) => r.contains_rect(rect),
        }
    }

    pub fn contains_point(&self, lon: f64, lat: f64) -> bool {
        match self {
            ValidArea::Everywhere => true,
            ValidArea::Region(region) => region.contains_point(lon, lat),
            ValidArea::Rect(r) => r.contains_point(lon, lat),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileOptions {
    /// Reuse neighbour values of the same cell. Off only to verify results.
    pub neighbor_cache: bool,
}

impl Default for TileOptions {
    fn default() -> Self {
        Self { neighbor_cache: true }
    }
}

pub trait TileProducer<T: Sample>: Send + Sync {
    fn tile(&self, rect: &PixelRect, level: usize) -> Result<Array2<T>>;
}

fn level_geometry(
    grid: &dyn GridIdSource,
    rect: &PixelRect,
    level: usize,
) -> Result<LevelGeometry> {
    let geom = grid.geometry(level).ok_or(Error::InvalidArgument {
        arg: "level",
        value: level.to_string(),
    })?;
    if !geom.contains(rect) {
        return Err(Error::InvalidArgument {
            arg: "rect",
            value: format!("{:?} outside {}x{}", rect, geom.width, geom.height),
        });
    }
    Ok(geom)
}

/// Render one tile of `accessor` at `level`.
pub fn render_tile<T, A>(
    grid: &dyn GridIdSource,
    accessor: &A,
    area: &ValidArea,
    rect: &PixelRect,
    level: usize,
    no_data: T,
    options: TileOptions,
) -> Result<Array2<T>>
where
    T: Sample,
    A: ValueAccessor<T> + ?Sized,
{
    let geom = level_geometry(grid, rect, level)?;
    let mut out = Array2::from_elem((rect.height, rect.width), no_data);
    if rect.is_empty() {
        return Ok(out);
    }

    let bounds = geom.bounds(rect);
    if !area.intersects(&bounds) {
        trace!("Tile {:?} at level {} outside the valid area", rect, level);
        return Ok(out);
    }
    let whole = area.covers(&bounds);
    let ids = grid.read(rect, level)?;

    // (seqnum, value) of the previous and current row
    let mut north: Vec<Option<(i32, T)>> = vec![None; rect.width];
    let mut current: Vec<Option<(i32, T)>> = vec![None; rect.width];

    for r in 0..rect.height {
        current.iter_mut().for_each(|c| *c = None);
        let y = rect.y + r;
        let mut row_whole = whole;
        if !whole {
            let row = geom.row_bounds(y, rect.x, rect.right());
            if !area.intersects(&row) {
                std::mem::swap(&mut north, &mut current);
                continue;
            }
            row_whole = area.covers(&row);
        }
        let lat = geom.pixel_lat(y);
        for c in 0..rect.width {
            if !row_whole && !area.contains_point(geom.pixel_lon(rect.x + c), lat) {
                continue;
            }
            let seqnum = ids[[r, c]];
            if seqnum <= 0 {
                continue;
            }
            let cached = if options.neighbor_cache {
                let west = c.checked_sub(1).and_then(|w| current[w]);
                let above = north[c];
                let north_east = north.get(c + 1).copied().flatten();
                [west, above, north_east]
                    .into_iter()
                    .flatten()
                    .find(|(s, _)| *s == seqnum)
                    .map(|(_, v)| v)
            } else {
                None
            };
            let value = match cached {
                Some(v) => v,
                None => accessor.get(seqnum, no_data),
            };
            out[[r, c]] = value;
            current[c] = Some((seqnum, value));
        }
        std::mem::swap(&mut north, &mut current);
    }
    Ok(out)
}

/// Band of one product rendered through a shared grid-id raster
pub struct BandTileProducer<T: Sample> {
    grid: Arc<dyn GridIdSource>,
    accessor: Arc<dyn ValueAccessor<T>>,
    area: ValidArea,
    no_data: T,
    options: TileOptions,
}

impl<T: Sample> BandTileProducer<T> {
    pub fn new(
        grid: Arc<dyn GridIdSource>,
        accessor: Arc<dyn ValueAccessor<T>>,
        no_data: T,
    ) -> Self {
        Self {
            grid,
            accessor,
            area: ValidArea::Everywhere,
            no_data,
            options: TileOptions::default(),
        }
    }

    pub fn with_area(mut self, area: ValidArea) -> Self {
        self.area = area;
        self
    }

    pub fn with_options(mut self, options: TileOptions) -> Self {
        self.options = options;
        self
    }

    pub fn no_data(&self) -> T {
        self.no_data
    }

    pub fn geometry(&self, level: usize) -> Option<LevelGeometry> {
        self.grid.geometry(level)
    }

    /// The whole level as one array, assembled tile by tile.
    pub fn render_level(&self, level: usize, tile_size: usize) -> Result<Array2<T>> {
        let geom = self.grid.geometry(level).ok_or(Error::InvalidArgument {
            arg: "level",
            value: level.to_string(),
        })?;
        render_level(self, &geom, level, tile_size, self.no_data)
    }
}

impl<T: Sample> TileProducer<T> for BandTileProducer<T> {
    fn tile(&self, rect: &PixelRect, level: usize) -> Result<Array2<T>> {
        render_tile(
            self.grid.as_ref(),
            self.accessor.as_ref(),
            &self.area,
            rect,
            level,
            self.no_data,
            self.options,
        )
    }
}

/// Assemble a full level from `tile_size` square tiles of `producer`.
pub fn render_level<T: Sample, P: TileProducer<T> + ?Sized>(
    producer: &P,
    geom: &LevelGeometry,
    level: usize,
    tile_size: usize,
    no_data: T,
) -> Result<Array2<T>> {
    if tile_size == 0 {
        return Err(Error::InvalidArgument {
            arg: "tile_size",
            value: "0".into(),
        });
    }
    let mut out = Array2::from_elem((geom.height, geom.width), no_data);
    for y in (0..geom.height).step_by(tile_size) {
        for x in (0..geom.width).step_by(tile_size) {
            let (w, h) = (tile_size.min(geom.width - x), tile_size.min(geom.height - y));
            let rect = PixelRect::new(x, y, w, h);
            let tile = producer.tile(&rect, level)?;
            out.slice_mut(s![y..rect.bottom(), x..rect.right()]).assign(&tile);
        }
    }
    Ok(out)
}
