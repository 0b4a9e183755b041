#![doc = r#"
smospro: decoding and tiled rendering of SMOS-style discrete-global-grid products.

This crate reads Earth-observation products stored as a header (`.HDR`, XML) plus a
little-endian binary data block (`.DBL`) of nested grid point records, and turns them
into per-band rasters on a global plate-carrée grid. Record layouts are not hard-coded:
they come from JSON binary-schema descriptions, and band semantics (scaling, fill
values, polarization, flag codings, rotation channels) from JSON band-descriptor
tables, both bundled and overridable from disk.

The core consists of:
- a schema-driven record decoder (`io::decoder`, `io::schema`),
- the grid point index mapping grid cells to records (`core::grid::index`),
- the discrete global grid mapper and its multi-resolution grid-id raster
  (`core::grid`),
- value accessors with scaling, incidence-angle interpolation, snapshot selection and
  polarization rotation (`core::value`),
- the snapshot aggregator (`core::snapshot`),
- the tile materialization engine (`core::tile`).

Stability
---------
The public library API is experimental in initial releases and may evolve as the
crate stabilizes. Breaking changes can occur.

Add dependency
--------------
```toml
[dependencies]
smospro = "0.1"
```

Quick start: render a band
--------------------------
```rust,no_run
use std::path::Path;
use smospro::{open_product, Registries, RenderParams, Renderer};

fn main() -> smospro::Result<()> {
    let registries = Registries::bundled()?;
    let product = open_product(Path::new("/data/SM_OPER_MIR_SCLF1C_example"), &registries)?;

    let renderer = Renderer::new(RenderParams::default())?;
    let bt_h = renderer.render_band_level::<f32>(&product, "BT_Value_H", 3, -999.0)?;
    println!("{:?}", bt_h.dim());
    Ok(())
}
```

Render a single tile through a custom accessor
----------------------------------------------
```rust,no_run
use std::path::Path;
use std::sync::Arc;
use smospro::core::grid::{GridIdSource, PixelRect};
use smospro::core::tile::{BandTileProducer, TileProducer, ValidArea};
use smospro::core::value::{AsSample, ValueAccessor};
use smospro::{band_accessor, open_product, Registries, RenderParams, Renderer};

fn main() -> smospro::Result<()> {
    let registries = Registries::bundled()?;
    let product = open_product(Path::new("/data/SM_OPER_MIR_SMUDP2_example"), &registries)?;
    let accessor = band_accessor(&product, "Soil_Moisture")?;

    let renderer = Renderer::new(RenderParams::default())?;
    let grid: Arc<dyn GridIdSource> = renderer.raster().clone();
    let typed: Arc<dyn ValueAccessor<f32>> = Arc::new(AsSample(accessor));
    let producer = BandTileProducer::new(grid, typed, f32::NAN)
        .with_area(ValidArea::Region(product.envelope()?));
    let tile = producer.tile(&PixelRect::new(1024, 256, 256, 256), 2)?;
    println!("{:?}", tile.dim());
    Ok(())
}
```

Export grid points inside a box
-------------------------------
```rust,no_run
use std::path::PathBuf;
use smospro::core::grid::GeoRect;
use smospro::types::CancelFlag;
use smospro::{run_export_batch, ExportParams, ExportTarget, GeoFilter};

fn main() -> smospro::Result<()> {
    let filter = GeoFilter::Box(GeoRect::new(-10.0, 35.0, 5.0, 45.0));
    let target = ExportTarget::Text(PathBuf::from("/out/points.txt"));
    let report = run_export_batch(
        &[PathBuf::from("/data/smos")],
        &filter,
        &target,
        &ExportParams::default(),
        &CancelFlag::new(),
    )?;
    println!("processed={} skipped={} errors={}", report.processed, report.skipped, report.errors);
    Ok(())
}
```

Error handling
--------------
All public functions return `smospro::Result<T>`; match on `smospro::Error` for
structured failures (unknown format, missing descriptors, invalid grid point ids,
cached aggregate failures, cancellation). Single values that cannot be decoded or
derived never fail a tile: they come back as the caller's no-data value.

Useful modules
--------------
- [`api`]: high-level, ergonomic entry points.
- [`core`]: grid, index, value accessors, snapshot info and tile engine.
- [`io`]: decoder, schemas, descriptors, headers, products and writers.
- [`types`]: shared enums (`PolMode`, `Split64`, `RotatedChannel`, `ProductFamily`).
- [`error`]: crate-level `Error` and `Result`.
"#]

// Core modules (public)
pub mod api;
pub mod core;
pub mod error;
pub mod io;
pub mod types;

// Curated public API surface
// Types
pub use core::params::{ExportParams, RenderParams};
pub use error::{Error, Result};
pub use types::{CancelFlag, PolMode, ProductFamily, RotatedChannel, Split64};

// Products
pub use io::{DescriptorRegistry, ProductFile, ProductHeader, SchemaRegistry};

// High-level API re-exports
pub use api::{
    BatchReport, ExportTarget, GeoFilter, Registries, Renderer, band_accessor, collect_products,
    open_product, run_export_batch, select_points, snapshot_accessor,

};
