use std::io::Write;
use std::path::{Path, PathBuf};

use super::{GeoTransform, write_atomic};
use crate::error::Result;

/// WKT of the geographic WGS 84 coordinate system all rasters are in.
pub const WGS84_WKT: &str = concat!(
    r#"GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563]],"#,
    r#"PRIMEM["Greenwich",0],UNIT["degree",0.0174532925199433],AUTHORITY["EPSG","4326"]]"#,
);


/// Path of the world file belonging to `image`.
pub fn world_file_path(image: &Path) -> PathBuf {
    let ext = image
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    let world_ext = match ext.as_str() {
        "jpg" | "jpeg" => "jgw".to_string(),
        "png" => "pgw".to_string(),
        "tif" | "tiff" => "tfw".to_string(),
        other => match other.chars().next() {
            Some(first) => format!("{first}w"),
            None => "wld".to_string(),
        },
    };
    image.with_extension(world_ext)
}

/// Write a world file next to the raster image. The world file stores the
/// transform in pixel-center convention.
pub fn write_world_file(image: &Path, transform: &GeoTransform) -> Result<PathBuf> {
    let world_path = world_file_path(image);
    let a = transform[1];
    let d = transform[4];
    let b = transform[2];
    let e = transform[5];
    let c = transform[0] + 0.5 * a + 0.5 * b;
    let f = transform[3] + 0.5 * d + 0.5 * e;

    write_atomic(&world_path, |w| {
        for v in [a, d, b, e, c, f] {
            writeln!(w, "{:.12}", v)?;
        }
        Ok(())
    })?;
    Ok(world_path)
}

/// Write a .prj file with the WGS 84 definition next to the raster image.
pub fn write_prj_file(image: &Path) -> Result<PathBuf> {
    let prj_path = image.with_extension("prj");
    write_atomic(&prj_path, |w| Ok(w.write_all(WGS84_WKT.as_bytes())?))?;
    Ok(prj_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_file_extensions() {
        assert_eq!(world_file_path(Path::new("a/b.tif")), PathBuf::from("a/b.tfw"));
        assert_eq!(world_file_path(Path::new("b.PNG")), PathBuf::from("b.pgw"));
        assert_eq!(world_file_path(Path::new("b.bmp")), PathBuf::from("b.bw"));
        assert_eq!(world_file_path(Path::new("b")), PathBuf::from("b.wld"));
    }

    #[test]
    fn pixel_center_convention() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("x.tif");
        let path = write_world_file(&image, &[-180.0, 0.5, 0.0, 90.0, 0.0, -0.5]).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        let values: Vec<f64> = text.lines().map(|l| l.parse().unwrap()).collect();
        assert_eq!(values, vec![0.5, 0.0, 0.0, -0.5, -179.75, 89.75]);
    }
}
