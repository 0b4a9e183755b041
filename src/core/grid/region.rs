//! Geographic rectangles and rectangle-union regions.
use serde::{Deserialize, Serialize};

use super::dgg::{coarse_tile_rect, coarse_tiles_intersecting, normalize_lon};

/// Axis-aligned lon/lat rectangle in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoRect {
    pub lon_min: f64,
    pub lat_min: f64,
    pub lon_max: f64,
    pub lat_max: f64,
}

impl GeoRect {
    pub const GLOBE: GeoRect = GeoRect {
        lon_min: -180.0,
        lat_min: -90.0,
        lon_max: 180.0,
        lat_max: 90.0,
    };

    /// Half extents of the rectangle drawn around a single grid point.
    pub const POINT_HALF_WIDTH: f64 = 0.02;
    pub const POINT_HALF_HEIGHT: f64 = 0.01;

    pub const fn new(lon_min: f64, lat_min: f64, lon_max: f64, lat_max: f64) -> Self {
        Self {
            lon_min,
            lat_min,
            lon_max,
            lat_max,
        }
    }

    /// 0.04° × 0.02° rectangle centred on a point, clipped to the globe.
    pub fn around_point(lon: f64, lat: f64) -> Self {
        let lon = normalize_lon(lon);
        Self::new(
            (lon - Self::POINT_HALF_WIDTH).max(-180.0),
            (lat - Self::POINT_HALF_HEIGHT).max(-90.0),
            (lon + Self::POINT_HALF_WIDTH).min(180.0),
            (lat + Self::POINT_HALF_HEIGHT).min(90.0),
        )
    }

    pub fn width(&self) -> f64 {
        self.lon_max - self.lon_min
    }

    pub fn height(&self) -> f64 {
        self.lat_max - self.lat_min
    }

    pub fn is_empty(&self) -> bool {
        !(self.width() > 0.0 && self.height() > 0.0)
    }

    /// Inclusive of the edges.
    pub fn contains_point(&self, lon: f64, lat: f64) -> bool {
        let lon = normalize_lon(lon);
        lon >= self.lon_min && lon <= self.lon_max && lat >= self.lat_min && lat <= self.lat_max
    }

    pub fn contains_rect(&self, other: &GeoRect) -> bool {
        other.lon_min >= self.lon_min
            && other.lon_max <= self.lon_max
            && other.lat_min >= self.lat_min
            && other.lat_max <= self.lat_max
    }

    /// Overlap with positive area; touching edges do not count.
    pub fn intersects(&self, other: &GeoRect) -> bool {
        self.lon_min < other.lon_max
            && other.lon_min < self.lon_max
            && self.lat_min < other.lat_max
            && other.lat_min < self.lat_max
    }

    pub fn union(&self, other: &GeoRect) -> GeoRect {
        GeoRect::new(
            self.lon_min.min(other.lon_min),
            self.lat_min.min(other.lat_min),
            self.lon_max.max(other.lon_max),
            self.lat_max.max(other.lat_max),
        )
    }

    /// Parts of `self` not covered by `cut`.
    pub fn subtract(&self, cut: &GeoRect) -> Vec<GeoRect> {
        if !self.intersects(cut) {
            return vec![*self];
        }
        let mid_lon_min = self.lon_min.max(cut.lon_min);
        let mid_lon_max = self.lon_max.min(cut.lon_max);
        [
            GeoRect::new(self.lon_min, self.lat_min, cut.lon_min, self.lat_max),
            GeoRect::new(cut.lon_max, self.lat_min, self.lon_max, self.lat_max),
            GeoRect::new(mid_lon_min, self.lat_min, mid_lon_max, cut.lat_min),
            GeoRect::new(mid_lon_min, cut.lat_max, mid_lon_max, self.lat_max),
        ]
        .into_iter()
        .filter(|r| !r.is_empty())
        .collect()
    }
}

/// Union of rectangles. Growth is monotonic: rectangles are only added.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Region {
    rects: Vec<GeoRect>,
}

impl Region {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn whole_globe() -> Self {
        Self {
            rects: vec![GeoRect::GLOBE],
        }
    }

    pub fn from_rect(rect: GeoRect) -> Self {
        Self { rects: vec![rect] }
    }

    pub fn rects(&self) -> &[GeoRect] {
        &self.rects
    }

    pub fn len(&self) -> usize {
        self.rects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Add `rect` unless the region already covers it. Returns whether the
    /// region changed.
    pub fn add(&mut self, rect: GeoRect) -> bool {
        if rect.is_empty() || self.covers(&rect) {
            return false;
        }
        self.rects.push(rect);
        true
    }

    /// True if the union of the region's rectangles covers `rect`.
    pub fn covers(&self, rect: &GeoRect) -> bool {
        if rect.is_empty() {
            return true;
        }
        if self.rects.iter().any(|r| r.contains_rect(rect)) {
            return true;
        }
        covered_by(*rect, &self.rects)
    }

    pub fn contains_point(&self, lon: f64, lat: f64) -> bool {
        self.rects.iter().any(|r| r.contains_point(lon, lat))
    }

    pub fn intersects(&self, rect: &GeoRect) -> bool {
        self.rects.iter().any(|r| r.intersects(rect))
    }

    pub fn bounds(&self) -> Option<GeoRect> {
        let (first, rest) = self.rects.split_first()?;
        Some(rest.iter().fold(*first, |acc, r| acc.union(r)))
    }

    /// Grow the region so it covers the point rectangle of `(lon, lat)`,
    /// snapping to the coarse tiles it overlaps.
    pub fn grow_to_point(&mut self, lon: f64, lat: f64) {
        let rect = GeoRect::around_point(lon, lat);
        if self.covers(&rect) {
            return;
        }
        for tile in coarse_tiles_intersecting(&rect) {
            if let Some(tile_rect) = coarse_tile_rect(tile) {
                self.add(tile_rect);
            }
        }
    }
}

// Earlier rectangles that did not overlap `rect` cannot overlap its pieces.
fn covered_by(rect: GeoRect, rects: &[GeoRect]) -> bool {
    if rect.is_empty() {
        return true;
    }
    for (i, r) in rects.iter().enumerate() {
        if r.contains_rect(&rect) {
            return true;
        }
        if r.intersects(&rect) {
            let rest = &rects[i + 1..];
            return rect.subtract(r).into_iter().all(|piece| covered_by(piece, rest));
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_rect_is_clipped() {
        let r = GeoRect::around_point(180.0, 90.0);
        assert_eq!(r.lon_max, 180.0);
        assert_eq!(r.lat_max, 90.0);
        assert!((r.lon_min - 179.98).abs() < 1e-12);
        let wrapped = GeoRect::around_point(200.0, 0.0);
        assert!(wrapped.contains_point(-160.0, 0.0));
    }

    #[test]
    fn covers_split_union() {
        let mut region = Region::new();
        assert!(region.add(GeoRect::new(0.0, 0.0, 10.0, 10.0)));
        assert!(region.add(GeoRect::new(10.0, 0.0, 20.0, 10.0)));
        let straddling = GeoRect::new(8.0, 2.0, 12.0, 4.0);
        assert!(region.covers(&straddling));
        assert!(!region.add(straddling));
        assert!(!region.covers(&GeoRect::new(18.0, 8.0, 22.0, 9.0)));
        assert_eq!(region.bounds(), Some(GeoRect::new(0.0, 0.0, 20.0, 10.0)));
    }

    #[test]
    fn adding_subsumed_tile_keeps_containment() {
        let mut region = Region::new();
        region.grow_to_point(1.0, 1.0);
        region.grow_to_point(30.0, -20.0);
        let before = region.clone();
        let points = [(1.0, 1.0), (5.0, 5.0), (30.0, -20.0), (-50.0, 40.0), (11.25, 11.25)];
        let tile = coarse_tile_rect(8 * 32 + 16).unwrap();
        assert!(!region.add(tile));
        assert_eq!(region, before);
        for (lon, lat) in points {
            assert_eq!(region.contains_point(lon, lat), before.contains_point(lon, lat));
        }
    }

    #[test]
    fn envelope_snaps_to_coarse_tiles() {
        let mut region = Region::new();
        region.grow_to_point(1.0, 1.0);
        assert_eq!(region.len(), 1);
        region.grow_to_point(2.0, 2.0);
        assert_eq!(region.len(), 1);
        region.grow_to_point(0.0, 0.0);
        assert_eq!(region.len(), 4);
        assert!(region.contains_point(-5.0, -5.0));
        assert!(!region.contains_point(100.0, 0.0));
    }
}
