//! Discrete global grid: cell mapping, id transforms, regions, the dense
//! grid point index and the multi-resolution grid-id raster.
pub mod dgg;
pub mod index;
pub mod raster;
pub mod region;

pub use dgg::{GridIdTransform, SEQNUM_MAX, SEQNUM_MIN};
pub use index::{GridPointIndex, GridPointIndexBuilder, ListSpan, RecordSpan};
pub use raster::{DggRaster, GridIdSource, LevelGeometry, PixelRect};
pub use region::{GeoRect, Region};
