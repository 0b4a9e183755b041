//! Output adapters: GeoTIFF rasters with world files, tab-separated text
//! export and binary subset export. Every file is written to a temporary
//! file next to its destination and persisted only once complete, so an
//! aborted export never leaves a partial file behind.
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::core::grid::{GeoRect, LevelGeometry, PixelRect};
use crate::error::Result;

pub mod subset;
pub mod text;
pub mod tiff;
pub mod worldfile;

/// GDAL-style affine transform `[x0, dx, rx, y0, ry, dy]`
pub type GeoTransform = [f64; 6];

/// Transform of a north-up raster covering `bounds` with `width × height` pixels.
pub fn geotransform(bounds: &GeoRect, width: usize, height: usize) -> GeoTransform {
    let dx = bounds.width() / width.max(1) as f64;
    let dy = bounds.height() / height.max(1) as f64;
    [bounds.lon_min, dx, 0.0, bounds.lat_max, 0.0, -dy]
}

/// Transform of a pixel rectangle of a level of the global raster.
pub fn level_geotransform(geom: &LevelGeometry, rect: &PixelRect) -> GeoTransform {
    geotransform(&geom.bounds(rect), rect.width, rect.height)
}

/// Write `path` through a temporary file in the same directory.
pub fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> Result<()>,
{
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        write(&mut writer)?;
        writer.flush()?;
    }
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_transform() {
        let gt = geotransform(&GeoRect::GLOBE, 720, 360);
        assert_eq!(gt, [-180.0, 0.5, 0.0, 90.0, 0.0, -0.5]);
    }

    #[test]
    fn failed_write_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let res = write_atomic(&path, |w| {
            w.write_all(b"partial")?;
            Err(crate::error::Error::Cancelled)
        });
        assert!(res.is_err());
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        write_atomic(&path, |w| Ok(w.write_all(b"done")?)).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "done");
    }
}
