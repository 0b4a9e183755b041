//! Fixed equal-area discrete global grid.
//!
//! Cell 1 is the north polar cap and cell 2 621 442 the south polar cap.
//! Between them 10 zones of 128 latitude rings each hold 2048 cells per ring.
//! Ring boundaries are equally spaced in sin(latitude), so every ring cell
//! and both caps cover the same area.
use serde::{Deserialize, Serialize};

use super::region::GeoRect;

pub const SEQNUM_MIN: i32 = 1;
pub const SEQNUM_MAX: i32 = 2_621_442;
pub const ZONE_COUNT: u32 = 10;
pub const RINGS_PER_ZONE: u32 = 128;
pub const RING_COUNT: u32 = ZONE_COUNT * RINGS_PER_ZONE;
pub const COLUMNS: u32 = 2048;

/// sin(latitude) of the cap boundaries
pub const CAP_SIN: f64 = 2_621_440.0 / 2_621_442.0;
pub const RING_HEIGHT: f64 = 2.0 * CAP_SIN / RING_COUNT as f64;

pub const COARSE_TILE_DEG: f64 = 11.25;
pub const COARSE_TILE_COLS: usize = 32;
pub const COARSE_TILE_ROWS: usize = 16;
pub const COARSE_TILE_COUNT: usize = COARSE_TILE_COLS * COARSE_TILE_ROWS;

/// Bring longitudes above 180° (and below −180°) back into [−180, 180].
pub fn normalize_lon(lon: f64) -> f64 {
    if lon > 180.0 {
        let l = lon - 360.0 * ((lon - 180.0) / 360.0).ceil();
        if l < -180.0 { l + 360.0 } else { l }
    } else if lon < -180.0 {
        lon + 360.0 * ((-180.0 - lon) / 360.0).ceil()
    } else {
        lon
    }
}

/// Latitude band of the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatBand {
    NorthCap,
    Ring(u32),
    SouthCap,
}

pub fn lat_band(lat: f64) -> LatBand {
    let s = lat.to_radians().sin();
    if s >= CAP_SIN {
        LatBand::NorthCap
    } else if s <= -CAP_SIN {
        LatBand::SouthCap
    } else {
        let ring = ((CAP_SIN - s) / RING_HEIGHT).floor();
        LatBand::Ring((ring.max(0.0) as u32).min(RING_COUNT - 1))
    }
}

/// Ring column of a (normalized) longitude.
pub fn column(lon: f64) -> u32 {
    let c = ((normalize_lon(lon) + 180.0) / 360.0 * COLUMNS as f64).floor();
    (c.max(0.0) as u32).min(COLUMNS - 1)
}

pub fn seqnum_of(band: LatBand, col: u32) -> i32 {
    match band {
        LatBand::NorthCap => SEQNUM_MIN,
        LatBand::SouthCap => SEQNUM_MAX,
        LatBand::Ring(ring) => 2 + (ring * COLUMNS + col) as i32,
    }
}

pub fn seqnum(lon: f64, lat: f64) -> i32 {
    seqnum_of(lat_band(lat), column(lon))
}

fn ring_lat_bounds(ring: u32) -> (f64, f64) {
    let top = CAP_SIN - ring as f64 * RING_HEIGHT;
    let bottom = top - RING_HEIGHT;
    (bottom.asin().to_degrees(), top.asin().to_degrees())
}

fn split(seqnum: i32) -> Option<(u32, u32)> {
    if seqnum <= SEQNUM_MIN || seqnum >= SEQNUM_MAX {
        return None;
    }
    let k = (seqnum - 2) as u32;
    Some((k / COLUMNS, k % COLUMNS))
}

/// Cell centre as `(lon, lat)`.
pub fn center(seqnum: i32) -> Option<(f64, f64)> {
    match seqnum {
        SEQNUM_MIN => Some((0.0, 90.0)),
        SEQNUM_MAX => Some((0.0, -90.0)),
        _ => {
            let (ring, col) = split(seqnum)?;
            let s = CAP_SIN - (ring as f64 + 0.5) * RING_HEIGHT;
            let lon = -180.0 + (col as f64 + 0.5) * 360.0 / COLUMNS as f64;
            Some((lon, s.asin().to_degrees()))
        }
    }
}

pub fn cell_rect(seqnum: i32) -> Option<GeoRect> {
    let cap_lat = CAP_SIN.asin().to_degrees();
    match seqnum {
        SEQNUM_MIN => Some(GeoRect::new(-180.0, cap_lat, 180.0, 90.0)),
        SEQNUM_MAX => Some(GeoRect::new(-180.0, -90.0, 180.0, -cap_lat)),
        _ => {
            let (ring, col) = split(seqnum)?;
            let (lat0, lat1) = ring_lat_bounds(ring);
            let w = 360.0 / COLUMNS as f64;
            let lon0 = -180.0 + col as f64 * w;
            Some(GeoRect::new(lon0, lat0, lon0 + w, lat1))
        }
    }
}

/// Zone (0..10) holding a cell; caps belong to the outer zones.
pub fn zone(seqnum: i32) -> Option<u32> {
    match seqnum {
        SEQNUM_MIN => Some(0),
        SEQNUM_MAX => Some(ZONE_COUNT - 1),
        _ => split(seqnum).map(|(ring, _)| ring / RINGS_PER_ZONE),
    }
}

pub fn coarse_tile_rect(index: usize) -> Option<GeoRect> {
    if index >= COARSE_TILE_COUNT {
        return None;
    }
    let col = index % COARSE_TILE_COLS;
    let row = index / COARSE_TILE_COLS;
    let lon0 = -180.0 + col as f64 * COARSE_TILE_DEG;
    let lat0 = -90.0 + row as f64 * COARSE_TILE_DEG;
    Some(GeoRect::new(lon0, lat0, lon0 + COARSE_TILE_DEG, lat0 + COARSE_TILE_DEG))
}

fn tile_range(min: f64, max: f64, origin: f64, count: usize) -> std::ops::Range<usize> {
    let lo = ((min - origin) / COARSE_TILE_DEG).floor().max(0.0) as usize;
    let hi = (((max - origin) / COARSE_TILE_DEG).ceil().max(0.0) as usize).min(count);
    lo.min(count)..hi.max(lo.min(count))
}

/// Coarse tiles overlapping `rect` (edge contact excluded).
pub fn coarse_tiles_intersecting(rect: &GeoRect) -> Vec<usize> {
    let cols = tile_range(rect.lon_min, rect.lon_max, -180.0, COARSE_TILE_COLS);
    let rows = tile_range(rect.lat_min, rect.lat_max, -90.0, COARSE_TILE_ROWS);
    let mut out = Vec::with_capacity(cols.len() * rows.len());
    for row in rows {
        for col in cols.clone() {
            out.push(row * COARSE_TILE_COLS + col);
        }
    }
    out
}

/// Mapping between raw grid point ids and cell seqnums
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridIdTransform {
    /// Swath products: ids grouped in zones of 1 000 000, each holding
    /// 262 144 cells; zones 0 and 9 carry one extra polar cell
    #[default]
    Zoned,
    /// Auxiliary products whose ids already are seqnums
    Identity,
}

const ZONE_STRIDE: u64 = 1_000_000;
const ZONE_CELLS: u64 = 262_144;
const POLAR_ZONE_CELLS: u64 = ZONE_CELLS + 1;

impl GridIdTransform {
    pub const ZONED_ID_MAX: u64 = 9 * ZONE_STRIDE + POLAR_ZONE_CELLS;

    pub fn max_raw_id(self) -> u64 {
        match self {
            GridIdTransform::Zoned => Self::ZONED_ID_MAX,
            GridIdTransform::Identity => SEQNUM_MAX as u64,
        }
    }

    /// Seqnum of a raw id, `None` if the id is outside the valid range.
    pub fn to_seqnum(self, raw: u64) -> Option<i32> {
        if raw == 0 || raw > self.max_raw_id() {
            return None;
        }
        match self {
            GridIdTransform::Identity => Some(raw as i32),
            GridIdTransform::Zoned => {
                let z = (raw - 1) / ZONE_STRIDE;
                let k = raw - z * ZONE_STRIDE;
                let capacity = if z == 0 || z == 9 { POLAR_ZONE_CELLS } else { ZONE_CELLS };
                if k > capacity {
                    return None;
                }
                let s = if z == 0 {
                    k
                } else {
                    POLAR_ZONE_CELLS + (z - 1) * ZONE_CELLS + k
                };
                Some(s as i32)
            }
        }
    }

    pub fn to_raw(self, seqnum: i32) -> Option<u64> {
        if !(SEQNUM_MIN..=SEQNUM_MAX).contains(&seqnum) {
            return None;
        }
        let s = seqnum as u64;
        match self {
            GridIdTransform::Identity => Some(s),
            GridIdTransform::Zoned => {
                if s <= POLAR_ZONE_CELLS {
                    return Some(s);
                }
                let t = s - POLAR_ZONE_CELLS;
                let z = ((t - 1) / ZONE_CELLS + 1).min(9);
                let k = t - (z - 1) * ZONE_CELLS;
                Some(z * ZONE_STRIDE + k)
            }
        }
    }
}
