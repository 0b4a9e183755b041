//! smospro-render: render bands of a product at one pyramid level as
//! GeoTIFF files with world and .prj files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use rayon::prelude::*;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use smospro::api::{Registries, Renderer, open_product};
use smospro::core::grid::GridIdSource;
use smospro::core::params::RenderParams;
use smospro::core::tile::BandTileProducer;
use smospro::io::ProductFile;
use smospro::io::writers::level_geotransform;
use smospro::io::writers::tiff::{TiffSample, write_geotiff};
use smospro::io::writers::worldfile::{write_prj_file, write_world_file};

#[derive(Parser, Debug)]
#[command(name = "smospro-render", version, about = "Render bands of a SMOS product as GeoTIFF")]
struct RenderArgs {
    /// Product directory, .HDR or .DBL file
    input: PathBuf,

    /// Bands to render, comma separated or repeated; all bands when omitted
    #[arg(short, long, value_delimiter = ',')]
    band: Vec<String>,

    /// Pyramid level (0 is the full resolution)
    #[arg(short, long, default_value_t = 3)]
    level: usize,

    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Render one snapshot instead of the 42.5° values
    #[arg(long)]
    snapshot: Option<u32>,

    /// Render parameters as JSON
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the bands of the product and exit
    #[arg(long, default_value_t = false)]
    list: bool,

    #[arg(long, default_value_t = false)]
    log: bool,
}

fn producer<T: TiffSample>(
    renderer: &Renderer,
    product: &Arc<ProductFile>,
    band: &str,
    snapshot: Option<u32>,
    no_data: T,
) -> smospro::Result<BandTileProducer<T>> {
    match snapshot {
        Some(id) => renderer.snapshot_producer(product, band, id, no_data),
        None => renderer.band_producer(product, band, no_data),
    }
}

fn render_to<T: TiffSample>(
    renderer: &Renderer,
    product: &Arc<ProductFile>,
    band: &str,
    args: &RenderArgs,
    path: &Path,
    no_data: T,
) -> smospro::Result<()> {
    let geom = renderer
        .raster()
        .geometry(args.level)
        .ok_or(smospro::Error::InvalidArgument {
            arg: "level",
            value: args.level.to_string(),
        })?;
    let raster = producer(renderer, product, band, args.snapshot, no_data)?
        .render_level(args.level, renderer.params().raster_tile_size)?;
    let transform = level_geotransform(&geom, &geom.full_rect());
    write_geotiff(path, &raster, &transform, no_data)?;
    write_world_file(path, &transform)?;
    write_prj_file(path)?;
    Ok(())
}

fn render_band(
    renderer: &Renderer,
    product: &Arc<ProductFile>,
    band: &str,
    args: &RenderArgs,
) -> smospro::Result<PathBuf> {
    let stem = product
        .data_path()
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "product".to_string());
    let name = match args.snapshot {
        Some(id) => format!("{}_{}_{}.tif", stem, band, id),
        None => format!("{}_{}.tif", stem, band),
    };
    let path = args.output_dir.join(name);
    let params = renderer.params();
    let flags = product
        .descriptors()
        .band(band)
        .map(|d| d.is_flag_band())
        .unwrap_or(false);
    if flags {
        render_to(renderer, product, band, args, &path, params.no_data_int)?;
    } else {
        render_to(renderer, product, band, args, &path, params.no_data_f32)?;
    }
    Ok(path)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = RenderArgs::parse();
    if args.log {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let params = match &args.config {
        Some(path) => RenderParams::from_json_file(path)?,
        None => RenderParams::default(),
    };
    let registries =
        Registries::with_overrides(params.schema_dir.as_deref(), params.descriptor_dir.as_deref())?;

    let product = open_product(&args.input, &registries)?;

    if args.list {
        for desc in &product.descriptors().bands {
            println!(
                "{}\t{}\t{}",
                desc.band_name,
                desc.unit.as_deref().unwrap_or("-"),
                desc.description.as_deref().unwrap_or("")
            );
        }
        return Ok(());
    }

    let bands: Vec<String> = if args.band.is_empty() {
        product.descriptors().band_names().map(str::to_string).collect()
    } else {
        args.band.clone()
    };
    std::fs::create_dir_all(&args.output_dir)?;
    let renderer = Renderer::new(params)?;

    // index and envelope are shared by every band
    product.grid_index()?;
    product.envelope()?;

    let results: Vec<(String, smospro::Result<PathBuf>)> = bands
        .par_iter()
        .map(|band| (band.clone(), render_band(&renderer, &product, band, &args)))
        .collect();

    let mut failed = 0;
    for (band, result) in results {
        match result {
            Ok(path) => info!("{} -> {}", band, path.display()),
            Err(e) => {
                error!("Rendering {} failed: {}", band, e);
                failed += 1;
            }
        }
    }
    if failed > 0 {
        return Err(format!("{} of {} bands failed", failed, bands.len()).into());
    }
    Ok(())
}
