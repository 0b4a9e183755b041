use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;

use smospro::api::GeoFilter;
use smospro::core::grid::GeoRect;

use super::errors::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "smospro",
    version,
    about = "Export SMOS grid points inside a region of interest as text or binary subsets"
)]
pub struct CliArgs {
    /// Region of interest as a box (also accepted as -box)
    #[arg(
        long = "box",
        num_args = 4,
        value_names = ["MIN_LON", "MAX_LON", "MIN_LAT", "MAX_LAT"],
        allow_negative_numbers = true,
        conflicts_with = "point"
    )]
    pub bbox: Option<Vec<f64>>,

    /// Region of interest as a single location (also accepted as -point)
    #[arg(long, num_args = 2, value_names = ["LON", "LAT"], allow_negative_numbers = true)]
    pub point: Option<Vec<f64>>,

    /// Output: an existing directory or a path ending in '/' receives binary
    /// subsets, any other path a text export. Text goes to stdout when omitted.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Export parameters as JSON
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory of binary schema JSON files overriding the bundled ones
    #[arg(long)]
    pub schema_dir: Option<PathBuf>,

    /// Directory of band descriptor JSON files overriding the bundled ones
    #[arg(long)]
    pub descriptor_dir: Option<PathBuf>,

    /// Enable logging (to stderr, filtered by RUST_LOG)
    #[arg(long, default_value_t = false)]
    pub log: bool,

    /// Product directories, product files, or directories holding products
    #[arg(required = true)]
    pub sources: Vec<PathBuf>,
}

/// Accept the single-dash `-box` and `-point` spellings.
pub fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|a| match a.to_str() {
            Some("-box") => OsString::from("--box"),
            Some("-point") => OsString::from("--point"),
            _ => a,
        })
        .collect()
}

fn check_lon(v: f64) -> bool {
    (-180.0..=180.0).contains(&v)
}

fn check_lat(v: f64) -> bool {
    (-90.0..=90.0).contains(&v)
}

impl CliArgs {
    /// Region of interest; the whole globe when none is given.
    pub fn filter(&self) -> Result<GeoFilter, AppError> {
        if let Some(b) = &self.bbox {
            let [min_lon, max_lon, min_lat, max_lat] = b[..] else {
                return Err(AppError::InvalidBox {
                    reason: format!("expected 4 values, got {}", b.len()),
                });
            };
            let lon_ok = check_lon(min_lon) && check_lon(max_lon);
            let lat_ok = check_lat(min_lat) && check_lat(max_lat);
            let in_range = lon_ok && lat_ok;

            if !in_range {

                return Err(AppError::InvalidBox {
                    reason: "coordinates out of range".to_string(),
                });
            }
            if min_lon > max_lon || min_lat > max_lat {
                return Err(AppError::InvalidBox {
                    reason: "minimum exceeds maximum".to_string(),
                });
            }
            return Ok(GeoFilter::Box(GeoRect::new(min_lon, min_lat, max_lon, max_lat)));
        }
        if let Some(p) = &self.point {
            let [lon, lat] = p[..] else {
                return Err(AppError::InvalidPoint {
                    reason: format!("expected 2 values, got {}", p.len()),
                });
            };
            if !(check_lon(lon) && check_lat(lat)) {
                return Err(AppError::InvalidPoint {
                    reason: format!("{} {} out of range", lon, lat),
                });
            }
            return Ok(GeoFilter::Point { lon, lat });
        }
        Ok(GeoFilter::Everywhere)
    }
}
