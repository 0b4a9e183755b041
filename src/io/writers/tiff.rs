//! Single-band GeoTIFF output in geographic coordinates (EPSG:4326).
use std::io::{Seek, Write};
use std::path::Path;

use ndarray::Array2;
use tiff::encoder::colortype::{Gray32Float, GrayI8, GrayI16, GrayI32};
use tiff::encoder::{DirectoryEncoder, TiffEncoder, TiffKind};
use tiff::tags::Tag;
use tracing::info;

use super::{GeoTransform, write_atomic};
use crate::core::value::Sample;
use crate::error::Result;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

// GTModelType = geographic, GTRasterType = pixel is area, GeographicType = WGS 84
const GEO_KEYS: [u16; 16] = [1, 1, 0, 3, 1024, 0, 1, 2, 1025, 0, 1, 1, 2048, 0, 1, 4326];

fn write_geo_tags<W: Write + Seek, K: TiffKind>(
    dir: &mut DirectoryEncoder<W, K>,
    transform: &GeoTransform,
    no_data: f64,
) -> Result<()> {
    let scale = [transform[1], -transform[5], 0.0];
    dir.write_tag(Tag::Unknown(MODEL_PIXEL_SCALE), &scale[..])?;
    let tiepoint = [0.0, 0.0, 0.0, transform[0], transform[3], 0.0];
    dir.write_tag(Tag::Unknown(MODEL_TIEPOINT), &tiepoint[..])?;
    dir.write_tag(Tag::Unknown(GEO_KEY_DIRECTORY), &GEO_KEYS[..])?;
    dir.write_tag(Tag::Unknown(GDAL_NODATA), no_data.to_string().as_str())?;
    Ok(())
}

/// Sample types with a TIFF colour type
pub trait TiffSample: Sample {
    fn encode<W: Write + Seek>(
        encoder: &mut TiffEncoder<W>,
        width: u32,
        height: u32,
        data: &[Self],
        transform: &GeoTransform,
        no_data: Self,
    ) -> Result<()>;
}

macro_rules! tiff_sample {
    ($($t:ty => $color:ty),*) => {$(
        impl TiffSample for $t {
            fn encode<W: Write + Seek>(
                encoder: &mut TiffEncoder<W>,
                width: u32,
                height: u32,
                data: &[Self],
                transform: &GeoTransform,
                no_data: Self,
            ) -> Result<()> {
                let mut image = encoder.new_image::<$color>(width, height)?;
                write_geo_tags(image.encoder(), transform, no_data.as_f64())?;
                image.write_data(data)?;
                Ok(())
            }
        }
    )*};
}

tiff_sample!(i8 => GrayI8, i16 => GrayI16, i32 => GrayI32, f32 => Gray32Float);

/// Write `raster` as a GeoTIFF at `path`.
pub fn write_geotiff<T: TiffSample>(
    path: &Path,
    raster: &Array2<T>,
    transform: &GeoTransform,
    no_data: T,
) -> Result<()> {
    let (rows, cols) = raster.dim();
    let data: Vec<T> = raster.iter().copied().collect();
    write_atomic(path, |w| {
        let mut encoder = TiffEncoder::new(w)?;
        T::encode(&mut encoder, cols as u32, rows as u32, &data, transform, no_data)
    })?;
    info!("Wrote {}x{} GeoTIFF {:?}", cols, rows, path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grid::GeoRect;
    use crate::io::writers::geotransform;

    #[test]
    fn writes_decodable_float_tiff() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("band.tif");
        let samples = vec![1.0f32, 2.0, -999.0, 4.0, 5.0, 6.0];
        let raster = Array2::from_shape_vec((2, 3), samples.clone()).unwrap();
        let gt = geotransform(&GeoRect::new(0.0, 0.0, 3.0, 2.0), 3, 2);
        write_geotiff(&path, &raster, &gt, -999.0).unwrap();

        let file = std::fs::File::open(&path).unwrap();
        let mut decoder = tiff::decoder::Decoder::new(file).unwrap();
        assert_eq!(decoder.dimensions().unwrap(), (3, 2));
        match decoder.read_image().unwrap() {
            tiff::decoder::DecodingResult::F32(v) => assert_eq!(v, samples),

            other => panic!("unexpected sample type: {:?}", std::mem::discriminant(&other)),
        }
    }

    #[test]
    fn writes_integer_tiff() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flags.tif");
        let raster = Array2::from_elem((4, 4), 7i16);
        let gt = geotransform(&GeoRect::GLOBE, 4, 4);
        write_geotiff(&path, &raster, &gt, 0).unwrap();
        let mut decoder = tiff::decoder::Decoder::new(std::fs::File::open(&path).unwrap()).unwrap();
        match decoder.read_image().unwrap() {
            tiff::decoder::DecodingResult::I16(v) => assert!(v.iter().all(|x| *x == 7)),
            _ => panic!("expected i16 samples"),
        }
    }
}
