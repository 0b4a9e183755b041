//! High-level, ergonomic library API: open products against the schema and
//! band-descriptor registries, build band accessors, render tiles and whole
//! levels, and run the batch exports (text and binary subset). Prefer these
//! entry points over the lower-level modules when integrating smospro.
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ndarray::Array2;
use tracing::{debug, info, trace, warn};

use crate::core::grid::{DggRaster, GeoRect, GridIdSource, PixelRect, dgg};
use crate::core::params::{ExportParams, RenderParams};
use crate::core::tile::{BandTileProducer, TileOptions, TileProducer, ValidArea};
use crate::core::value::{
    AsSample, FieldAccessor, ObservationAccessor, ObservationMember, ObservationView, RecordSource,
    RotatedBt, RotationMembers, Sample, Scaled, ValueAccessor,
};
use crate::error::{Error, Result};
use crate::io::descriptors::{BandDescriptor, DescriptorRegistry};
use crate::io::product::{ProductFile, ProductKind, resolve_product_paths};
use crate::io::schema::SchemaRegistry;
use crate::io::writers::subset::write_subset;
use crate::io::writers::text::{Cell, TextWriter};
use crate::io::writers::write_atomic;
use crate::types::CancelFlag;

/// Schema and band-descriptor registries shared by every opened product
pub struct Registries {
    pub schemas: SchemaRegistry,
    pub descriptors: DescriptorRegistry,
}

impl Registries {
    /// The bundled resources only.
    pub fn bundled() -> Result<Self> {
        Self::with_overrides(None, None)
    }

    /// Bundled resources, overridden by the JSON files of the given directories.
    pub fn with_overrides(
        schema_dir: Option<&Path>,
        descriptor_dir: Option<&Path>,
    ) -> Result<Self> {
        let mut schemas = SchemaRegistry::with_bundled()?;
        let mut descriptors = DescriptorRegistry::with_bundled()?;
        if let Some(dir) = schema_dir {
            let n = schemas.load_dir(dir)?;
            info!("Loaded {} schemas from {}", n, dir.display());
        }
        if let Some(dir) = descriptor_dir {
            let n = descriptors.load_dir(dir)?;
            info!("Loaded {} descriptor tables from {}", n, dir.display());
        }
        Ok(Self { schemas, descriptors })
    }
}

/// Open a product directory, `.HDR` or `.DBL` file.
pub fn open_product(path: &Path, registries: &Registries) -> Result<Arc<ProductFile>> {
    ProductFile::open(path, &registries.schemas, &registries.descriptors).map(Arc::new)
}

fn unknown_band(product: &ProductFile, band: &str) -> Error {
    Error::UnknownBand {
        band: band.to_string(),
        format: product.format().to_string(),
    }
}

fn descriptor<'a>(product: &'a ProductFile, band: &str) -> Result<&'a BandDescriptor> {
    product
        .descriptors()
        .band(band)
        .ok_or_else(|| unknown_band(product, band))
}

/// Observation member with the scaling of the descriptor table.
fn scaled_member(product: &ProductFile, names: &[&str]) -> Result<ObservationMember> {
    for name in names {
        if let Some(index) = product.observation_member(name) {
            let scaling = product.descriptors().member_scaling(name);
            return Ok(ObservationMember::scaled(index, scaling.factor, scaling.offset));
        }
    }
    let name = names.first().copied().unwrap_or_default();
    Err(product.schema().missing_role("rotation", name).into())
}

fn rotation_members(product: &ProductFile) -> Result<RotationMembers> {
    let bt_imag = if product.family().is_full_pol() {
        Some(scaled_member(product, &["BT_Value_Imag"])?)
    } else {
        None
    };
    Ok(RotationMembers {
        bt_real: scaled_member(product, &["BT_Value_Real", "BT_Value"])?,
        bt_imag,
        accuracy: scaled_member(product, &["Pixel_Radiometric_Accuracy"])?,
        faraday: scaled_member(product, &["Faraday_Rotation_Angle"])?,
        geometric: scaled_member(product, &["Geometric_Rotation_Angle"])?,
    })
}

fn observation_accessor(
    product: &Arc<ProductFile>,
    desc: &BandDescriptor,
    view: ObservationView,
) -> Result<Arc<dyn ValueAccessor<f64>>> {
    let Some(pol) = desc.polarization else {
        return Err(unknown_band(product, &desc.band_name));
    };
    let index = product
        .observation_member(&desc.member)
        .ok_or_else(|| unknown_band(product, &desc.band_name))?;
    let member = ObservationMember {
        index,
        factor: desc.scaling_factor,
        offset: desc.scaling_offset,
        fill: desc.fill_value,
    };
    let source: Arc<dyn RecordSource> = product.clone();
    let mut accessor = ObservationAccessor::new(source, view, pol, member);
    if desc.is_flag_band() {
        accessor = accessor.flag_band();
    }
    Ok(Arc::new(accessor))
}

/// Value accessor of a band, chosen from its descriptor: grid point field,
/// observation member reduced per polarization, or rotated channel.
pub fn band_accessor(
    product: &Arc<ProductFile>,
    band: &str,
) -> Result<Arc<dyn ValueAccessor<f64>>> {
    let desc = descriptor(product, band)?;

    if let Some(channel) = desc.rotation {
        if !matches!(product.kind(), ProductKind::Science(_)) {
            return Err(unknown_band(product, band));
        }
        let source: Arc<dyn RecordSource> = product.clone();
        let rotated = RotatedBt::new(source, rotation_members(product)?, channel);
        let accessor: Arc<dyn ValueAccessor<f64>> = if desc.is_scaled() {
            Arc::new(Scaled::new(rotated, desc.scaling_factor, desc.scaling_offset))
        } else {
            Arc::new(rotated)
        };
        return Ok(accessor);
    }

    if desc.polarization.is_some() {
        let view = match product.kind() {
            ProductKind::Science(_) => ObservationView::Interpolated,
            ProductKind::Browse => ObservationView::Browse,
            ProductKind::Grid => return Err(unknown_band(product, band)),
        };
        return observation_accessor(product, desc, view);
    }

    let member = product
        .point_member(&desc.member)
        .ok_or_else(|| unknown_band(product, band))?;
    let source: Arc<dyn RecordSource> = product.clone();
    let field = FieldAccessor::new(source, member)
        .with_split(desc.split64)
        .with_fill(desc.fill_value);
    let accessor: Arc<dyn ValueAccessor<f64>> = if desc.is_scaled() {
        Arc::new(Scaled::new(field, desc.scaling_factor, desc.scaling_offset))
    } else {
        Arc::new(field)
    };
    Ok(accessor)
}

/// Accessor of an observation band restricted to one snapshot.
pub fn snapshot_accessor(
    product: &Arc<ProductFile>,
    band: &str,
    snapshot_id: u32,
) -> Result<Arc<dyn ValueAccessor<f64>>> {
    let desc = descriptor(product, band)?;
    if desc.polarization.is_none() || !matches!(product.kind(), ProductKind::Science(_)) {
        return Err(unknown_band(product, band));
    }
    observation_accessor(product, desc, ObservationView::Snapshot(snapshot_id))
}

/// Renders bands of any number of products through one shared grid-id raster.
pub struct Renderer {
    raster: Arc<DggRaster>,
    params: RenderParams,
}

impl Renderer {
    pub fn new(params: RenderParams) -> Result<Self> {
        Ok(Self {
            raster: Arc::new(params.build_raster()?),
            params,
        })
    }

    pub fn params(&self) -> &RenderParams {
        &self.params
    }

    pub fn raster(&self) -> &Arc<DggRaster> {
        &self.raster
    }

    fn producer<T: Sample>(
        &self,
        accessor: Arc<dyn ValueAccessor<f64>>,
        area: ValidArea,
        no_data: T,
    ) -> BandTileProducer<T> {
        let typed: Arc<dyn ValueAccessor<T>> = Arc::new(AsSample(accessor));
        let grid: Arc<dyn GridIdSource> = self.raster.clone();
        BandTileProducer::new(grid, typed, no_data)
            .with_area(area)
            .with_options(TileOptions {
                neighbor_cache: self.params.neighbor_cache,
            })
    }

    /// Producer of a band, restricted to the product's envelope.
    pub fn band_producer<T: Sample>(
        &self,
        product: &Arc<ProductFile>,
        band: &str,
        no_data: T,
    ) -> Result<BandTileProducer<T>> {
        let accessor = band_accessor(product, band)?;
        let area = ValidArea::Region(product.envelope()?);
        Ok(self.producer(accessor, area, no_data))
    }

    /// Producer of one snapshot of an observation band, restricted to the
    /// snapshot's area.
    pub fn snapshot_producer<T: Sample>(
        &self,
        product: &Arc<ProductFile>,
        band: &str,
        snapshot_id: u32,
        no_data: T,
    ) -> Result<BandTileProducer<T>> {
        let accessor = snapshot_accessor(product, band, snapshot_id)?;
        let info = product.snapshot_info()?;
        let area = info.area(snapshot_id).ok_or(Error::InvalidArgument {
            arg: "snapshot",
            value: snapshot_id.to_string(),
        })?;
        Ok(self.producer(accessor, ValidArea::Rect(area), no_data))
    }

    pub fn render_band_tile<T: Sample>(
        &self,
        product: &Arc<ProductFile>,
        band: &str,
        rect: &PixelRect,
        level: usize,
        no_data: T,
    ) -> Result<Array2<T>> {
        self.band_producer(product, band, no_data)?.tile(rect, level)
    }

    pub fn render_band_level<T: Sample>(
        &self,
        product: &Arc<ProductFile>,
        band: &str,
        level: usize,
        no_data: T,
    ) -> Result<Array2<T>> {
        self.band_producer(product, band, no_data)?
            .render_level(level, self.params.raster_tile_size)
    }
}

/// Grid points selected by an export
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum GeoFilter {
    #[default]
    Everywhere,
    /// Grid points inside the rectangle
    Box(GeoRect),
    /// The grid point of the cell containing the location
    Point { lon: f64, lat: f64 },
}

impl GeoFilter {
    pub fn accepts(&self, seqnum: i32, lon: f64, lat: f64) -> bool {
        match self {
            GeoFilter::Everywhere => true,
            GeoFilter::Box(rect) => rect.contains_point(dgg::normalize_lon(lon), lat),
            GeoFilter::Point { lon: plon, lat: plat } => dgg::seqnum(*plon, *plat) == seqnum,
        }
    }

    /// Quick rejection of whole products by their envelope.
    pub fn may_intersect(&self, envelope: &crate::core::grid::Region) -> bool {
        match self {
            GeoFilter::Everywhere => true,
            GeoFilter::Box(rect) => envelope.intersects(rect),
            GeoFilter::Point { lon, lat } => {
                envelope.intersects(&GeoRect::around_point(*lon, *lat))
            }
        }
    }
}

/// Where exported grid points go
#[derive(Debug, Clone, PartialEq)]
pub enum ExportTarget {
    /// Binary subsets written into a directory
    Subset(PathBuf),
    /// One tab-separated text file
    Text(PathBuf),
    Stdout,
}

impl ExportTarget {
    /// Existing directories and paths ending in a separator are subset
    /// targets, other paths text files, no path standard output.
    pub fn from_output(path: Option<&Path>) -> Self {
        match path {
            None => ExportTarget::Stdout,
            Some(p) => {
                let text = p.to_string_lossy();
                if p.is_dir() || text.ends_with('/') || text.ends_with(std::path::MAIN_SEPARATOR) {
                    ExportTarget::Subset(p.to_path_buf())
                } else {
                    ExportTarget::Text(p.to_path_buf())
                }
            }
        }
    }
}

/// Summary of a batch
#[derive(Debug, Default, Clone)]
pub struct BatchReport {
    pub processed: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// Products named by `sources`: product directories or files, or
/// directories whose immediate entries are products.
pub fn collect_products(sources: &[PathBuf]) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for source in sources {
        if resolve_product_paths(source).is_ok() {
            out.push(source.clone());
            continue;
        }
        match std::fs::read_dir(source) {
            Ok(entries) => {
                let mut children: Vec<PathBuf> = entries
                    .filter_map(|e| e.ok().map(|e| e.path()))
                    .filter(|p| p.is_dir())
                    .collect();
                children.sort();
                out.extend(children);
            }
            // reported when the batch tries to open it
            Err(_) => out.push(source.clone()),
        }
    }
    out
}

/// Record indices and seqnums of the grid points accepted by `filter`.
pub fn select_points(
    product: &ProductFile,
    filter: &GeoFilter,
    cancel: &CancelFlag,
) -> Result<Vec<(usize, i32)>> {
    let envelope = product.envelope()?;
    if !filter.may_intersect(&envelope) {
        return Ok(Vec::new());
    }
    let mut selected = Vec::new();
    product.for_each_record(|record, seqnum, bytes| {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let (lon, lat) = product.location_of(bytes)?;
        if filter.accepts(seqnum, lon, lat) {
            selected.push((record, seqnum));
        }
        Ok(())
    })?;
    Ok(selected)
}

enum ColumnSource {
    Member(usize),
    Derived(Arc<dyn ValueAccessor<f64>>),
}

struct TextColumn {
    name: String,
    source: ColumnSource,
}

/// Raw scalars of the grid point record, then the 42.5° brightness
/// temperatures per polarization of science products.
fn text_columns(product: &Arc<ProductFile>, params: &ExportParams) -> Result<Vec<TextColumn>> {
    let mut columns: Vec<TextColumn> = product
        .point_layout()
        .compound
        .members()
        .iter()
        .enumerate()
        .filter(|(_, m)| m.ty.as_leaf().is_some())
        .map(|(i, m)| TextColumn {
            name: m.name.clone(),
            source: ColumnSource::Member(i),
        })
        .collect();

    if params.derived_columns && matches!(product.kind(), ProductKind::Science(_)) {
        for band in &product.descriptors().bands {
            if band.polarization.is_some() && band.member.starts_with("BT_Value") {
                columns.push(TextColumn {
                    name: band.band_name.clone(),
                    source: ColumnSource::Derived(band_accessor(product, &band.band_name)?),
                });
            }
        }
    }
    Ok(columns)
}

/// Write the selected grid points of `product` as one text block.
pub fn export_text<W: Write>(
    product: &Arc<ProductFile>,
    points: &[(usize, i32)],
    writer: &mut TextWriter<W>,
    params: &ExportParams,
    cancel: &CancelFlag,
) -> Result<()> {
    let columns = text_columns(product, params)?;
    let names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
    writer.begin_product(&product.header().file_name, &names)?;

    let mut cells = Vec::with_capacity(columns.len());
    for (record, seqnum) in points {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let bytes = product.read_record_bytes(*record)?;
        cells.clear();
        for column in &columns {
            cells.push(match &column.source {
                ColumnSource::Member(m) => match product.member_of(&bytes, *m) {
                    Ok(v) => Cell::Raw(v),
                    Err(e) => {
                        trace!("{} of record {}: {}", column.name, record, e);
                        Cell::Missing
                    }
                },
                ColumnSource::Derived(acc) => Cell::Derived(acc.get(*seqnum, f64::NAN)),
            });
        }
        writer.write_row(&cells)?;
    }
    Ok(())
}

enum Sink<'a, W: Write> {
    Text(&'a mut TextWriter<W>),
    Subset(&'a Path),
}

fn export_one<W: Write>(
    path: &Path,
    registries: &Registries,
    filter: &GeoFilter,
    sink: &mut Sink<'_, W>,
    params: &ExportParams,
    cancel: &CancelFlag,
) -> Result<bool> {
    let product = open_product(path, registries)?;
    let points = select_points(&product, filter, cancel)?;
    if points.is_empty() {
        debug!("No grid points of {} pass the filter", path.display());
        return Ok(false);
    }
    match sink {
        Sink::Text(writer) => export_text(&product, &points, writer, params, cancel)?,
        Sink::Subset(dir) => {
            let records: Vec<usize> = points.iter().map(|(r, _)| *r).collect();
            write_subset(&product, &records, *dir, cancel)?;
        }
    }
    info!("Exported {} grid points of {}", points.len(), path.display());
    Ok(true)
}

fn run_products<W: Write>(
    products: &[PathBuf],
    registries: &Registries,
    filter: &GeoFilter,
    sink: &mut Sink<'_, W>,
    params: &ExportParams,
    cancel: &CancelFlag,
) -> Result<BatchReport> {
    let mut report = BatchReport::default();
    for path in products {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        match export_one(path, registries, filter, sink, params, cancel) {
            Ok(true) => report.processed += 1,
            Ok(false) => report.skipped += 1,
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                report.errors += 1;
            }
        }
    }
    Ok(report)
}

/// Export the grid points of every product in `sources` passing `filter`.
/// Failing products are logged, counted and skipped; cancellation stops
/// the batch with `Error::Cancelled` and leaves no partial output file.
pub fn run_export_batch(
    sources: &[PathBuf],
    filter: &GeoFilter,
    target: &ExportTarget,
    params: &ExportParams,
    cancel: &CancelFlag,
) -> Result<BatchReport> {
    let registries =
        Registries::with_overrides(params.schema_dir.as_deref(), params.descriptor_dir.as_deref())?;
    let products = collect_products(sources);
    info!("Exporting {} products", products.len());

    let report = match target {
        ExportTarget::Subset(dir) => {
            std::fs::create_dir_all(dir)?;
            let mut sink: Sink<'_, std::io::Sink> = Sink::Subset(dir);
            run_products(&products, &registries, filter, &mut sink, params, cancel)?
        }
        ExportTarget::Text(file) => {
            let mut report = BatchReport::default();
            write_atomic(file, |w| {
                let mut writer = TextWriter::new(w, params.no_data_text.clone());
                let mut sink = Sink::Text(&mut writer);
                report = run_products(&products, &registries, filter, &mut sink, params, cancel)?;
                writer.into_inner()?;
                Ok(())
            })?;
            report
        }
        ExportTarget::Stdout => {
            let stdout = std::io::stdout();
            let mut writer = TextWriter::new(stdout.lock(), params.no_data_text.clone());
            let mut sink = Sink::Text(&mut writer);
            let report = run_products(&products, &registries, filter, &mut sink, params, cancel)?;

            drop(writer.into_inner()?);
            report
        }
    };
    info!(
        "Export finished: {} processed, {} skipped, {} errors",
        report.processed, report.skipped, report.errors
    );
    Ok(report)
}
