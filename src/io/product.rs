//! Product files: header + binary data block.
//!
//! A `ProductFile` resolves the schema of its data block once at open time
//! into a layout (where the grid point lists, ids, coordinates, observation
//! lists and snapshot list live) and exposes record access to the value
//! accessors. The grid point index, the envelope and the snapshot info are
//! file-wide aggregates built lazily, at most once.
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use tracing::{debug, info};

use crate::core::grid::{
    GridIdTransform, GridPointIndex, GridPointIndexBuilder, ListSpan, RecordSpan, Region,
};
use crate::core::lazy::LazyAggregate;
use crate::core::snapshot::{SnapshotInfo, SnapshotInfoBuilder};
use crate::core::value::{Observation, RecordSource};
use crate::error::{Error, Result};
use crate::io::decoder::{
    ByteSource, CompoundType, DecodeError, Datum, Decoder, FileSource, SeqLength, SequenceType,
    TypeRef, Value, WindowedSource,
};
use crate::io::descriptors::{DescriptorRegistry, DescriptorTable, MemberScaling};
use crate::io::format::FormatId;
use crate::io::header::ProductHeader;
use crate::io::schema::{BinarySchema, SchemaError, SchemaRegistry};
use crate::types::ProductFamily;

/// Where the grid point lists of a data block are
#[derive(Debug, Clone)]
pub enum GridLayout {
    /// One counted list, member `list` of the root compound
    Flat { list: usize },
    /// A list of zones (member `zones` of the root), each holding a counted
    /// grid point list as member `list` of `zone`
    Zoned {
        zones: usize,
        zone: Arc<CompoundType>,
        list: usize,
    },
}

/// Snapshot list of science products
#[derive(Debug, Clone)]
pub struct SnapshotLayout {
    pub list: usize,
    pub info: Arc<CompoundType>,
    pub id: usize,
    pub time: Option<usize>,
}

#[derive(Debug, Clone)]
pub enum ProductKind {
    /// Plain grid point records (level 2, auxiliary)
    Grid,
    /// Observation lists already reduced to the reference incidence angle
    Browse,
    /// Multi-angle observation lists with a snapshot list
    Science(SnapshotLayout),
}

/// Observation list of a grid point record
#[derive(Debug, Clone)]
pub struct ObservationLayout {
    pub list: usize,
    pub element: Arc<CompoundType>,
    pub flags: usize,
    pub incidence: Option<usize>,
    pub incidence_scaling: MemberScaling,
    pub snapshot_id: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct PointLayout {
    pub compound: Arc<CompoundType>,
    pub id: usize,
    pub latitude: usize,
    pub longitude: usize,
    pub observations: Option<ObservationLayout>,
}

pub struct ProductFile {
    header_path: PathBuf,
    data_path: PathBuf,
    header: ProductHeader,
    format: FormatId,
    family: ProductFamily,
    schema: Arc<BinarySchema>,
    descriptors: Arc<DescriptorTable>,
    source: FileSource,
    layout: GridLayout,
    kind: ProductKind,
    point: PointLayout,
    grid_index: LazyAggregate<GridPointIndex>,
    envelope: LazyAggregate<Region>,
    snapshot_info: LazyAggregate<SnapshotInfo>,
}

impl std::fmt::Debug for ProductFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProductFile")
            .field("data_path", &self.data_path)
            .field("format", &self.format.to_string())
            .field("family", &self.family)
            .finish_non_exhaustive()
    }
}

fn has_ext(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}

fn sibling(path: &Path, ext: &str) -> Option<PathBuf> {
    [ext.to_ascii_uppercase(), ext.to_ascii_lowercase()]
        .into_iter()
        .map(|e| path.with_extension(e))
        .find(|p| p.is_file())
}

fn not_found(what: String) -> Error {
    Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, what))
}

/// Header and data block paths of a product given as a directory, a `.HDR`
/// or a `.DBL` file.
pub fn resolve_product_paths(path: &Path) -> Result<(PathBuf, PathBuf)> {
    if path.is_dir() {
        let mut headers: Vec<PathBuf> = std::fs::read_dir(path)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && has_ext(p, "hdr"))
            .collect();
        headers.sort();
        for hdr in headers {
            if let Some(dbl) = sibling(&hdr, "dbl") {
                return Ok((hdr, dbl));
            }
        }
        return Err(not_found(format!("no .HDR/.DBL pair in {}", path.display())));
    }
    if has_ext(path, "hdr") {
        let dbl = sibling(path, "dbl")
            .ok_or_else(|| not_found(format!("no data block for {}", path.display())))?;
        return Ok((path.to_path_buf(), dbl));
    }
    if has_ext(path, "dbl") {
        let hdr = sibling(path, "hdr")
            .ok_or_else(|| not_found(format!("no header for {}", path.display())))?;
        return Ok((hdr, path.to_path_buf()));
    }
    Err(not_found(format!("not a product: {}", path.display())))
}

fn sequence_of(ty: &TypeRef) -> Option<(&Arc<SequenceType>, &Arc<CompoundType>)> {
    match ty {
        TypeRef::Sequence(seq) => match &seq.element {
            TypeRef::Compound(c) => Some((seq, c)),
            _ => None,
        },
        _ => None,
    }
}

fn compound_sequence<'a>(
    schema: &BinarySchema,
    owner: &'a CompoundType,
    role: &'static str,
    name: &str,
) -> std::result::Result<(usize, &'a Arc<SequenceType>, &'a Arc<CompoundType>), SchemaError> {
    let idx = owner.member_index(name).ok_or_else(|| schema.missing_role(role, name))?;
    let (seq, element) =
        sequence_of(&owner.members()[idx].ty).ok_or_else(|| schema.missing_role(role, name))?;
    Ok((idx, seq, element))
}

fn leaf_member(
    schema: &BinarySchema,
    owner: &CompoundType,
    role: &'static str,
    name: &str,
) -> std::result::Result<usize, SchemaError> {
    owner
        .member_index(name)
        .filter(|i| owner.members()[*i].ty.as_leaf().is_some())
        .ok_or_else(|| schema.missing_role(role, name))
}

// Grid point lists are patched by subset export, so their length must be a counter field.
fn counter_of(
    schema: &BinarySchema,
    seq: &SequenceType,
    name: &str,
) -> std::result::Result<usize, SchemaError> {
    match seq.length {
        SeqLength::Field(idx) => Ok(idx),
        SeqLength::Static(_) => Err(schema.missing_role("grid_point_counter", name)),
    }
}

fn resolve_layout(
    schema: &BinarySchema,
    descriptors: &DescriptorTable,
    family: ProductFamily,
) -> std::result::Result<(GridLayout, PointLayout, ProductKind), SchemaError> {
    let roles = &schema.roles;
    let root = &schema.root;

    let (layout, point) = match &roles.zone_list {
        Some(zone_list) => {
            let (zones, _, zone) = compound_sequence(schema, root, "zone_list", zone_list)?;
            let (list, seq, point) =
                compound_sequence(schema, zone, "grid_point_list", &roles.grid_point_list)?;
            counter_of(schema, seq, &roles.grid_point_list)?;
            (
                GridLayout::Zoned {
                    zones,
                    zone: zone.clone(),
                    list,
                },
                point.clone(),
            )
        }
        None => {
            let (list, seq, point) =
                compound_sequence(schema, root, "grid_point_list", &roles.grid_point_list)?;
            counter_of(schema, seq, &roles.grid_point_list)?;
            (GridLayout::Flat { list }, point.clone())
        }
    };

    let observations = match point.member_index(&roles.observations) {
        Some(_) => {
            let (list, _, element) =
                compound_sequence(schema, &point, "observations", &roles.observations)?;
            Some(ObservationLayout {
                list,
                element: element.clone(),
                flags: leaf_member(schema, element, "observation_flags", &roles.observation_flags)?,
                incidence: element.member_index(&roles.incidence_angle),
                incidence_scaling: descriptors.member_scaling(&roles.incidence_angle),
                snapshot_id: element.member_index(&roles.observation_snapshot_id),
            })
        }
        None => None,
    };

    let kind = if family.is_science() {
        let (list, _, info) =
            compound_sequence(schema, root, "snapshot_list", &roles.snapshot_list)?;
        ProductKind::Science(SnapshotLayout {
            list,
            info: info.clone(),
            id: leaf_member(schema, info, "snapshot_id", &roles.snapshot_id)?,
            time: info.member_index(&roles.snapshot_time),
        })
    } else if family.is_browse() {
        ProductKind::Browse
    } else {
        ProductKind::Grid
    };
    if !matches!(kind, ProductKind::Grid) && observations.is_none() {
        return Err(schema.missing_role("observations", &roles.observations));
    }

    let point = PointLayout {
        id: leaf_member(schema, &point, "grid_point_id", &roles.grid_point_id)?,
        latitude: leaf_member(schema, &point, "latitude", &roles.latitude)?,
        longitude: leaf_member(schema, &point, "longitude", &roles.longitude)?,
        observations,
        compound: point,
    };
    Ok((layout, point, kind))
}

const SNAPSHOT_EPOCH: (i32, u32, u32) = (2000, 1, 1);

impl ProductFile {
    /// Open a product (directory, `.HDR` or `.DBL`). Schema and descriptors
    /// are looked up by the header's datablock schema identifier.
    pub fn open(
        path: &Path,
        schemas: &SchemaRegistry,
        descriptors: &DescriptorRegistry,
    ) -> Result<Self> {
        let (header_path, data_path) = resolve_product_paths(path)?;
        let header = ProductHeader::read(&header_path)?;
        let format = FormatId::parse(&header.datablock_schema).ok_or_else(|| Error::UnknownFormat {
            format: header.datablock_schema.clone(),
        })?;
        let schema = schemas.get(&format.key()).ok_or_else(|| Error::UnknownFormat {
            format: format.to_string(),
        })?;
        let table = descriptors.get(&format.key()).ok_or_else(|| Error::MissingDescriptors {
            format: format.to_string(),
        })?;
        let family = format.family().ok_or_else(|| Error::UnsupportedProduct {
            file_type: format.file_type.clone(),
            format: format.to_string(),
        })?;
        let (layout, point, kind) = resolve_layout(&schema, &table, family)?;
        let source = FileSource::open(&data_path)?;
        info!(
            "Opened {} ({}, {} bytes, format {})",
            data_path.display(),
            family,
            source.len(),
            format
        );
        Ok(Self {
            header_path,
            data_path,
            header,
            format,
            family,
            schema,
            descriptors: table,
            source,
            layout,
            kind,
            point,
            grid_index: LazyAggregate::new("grid-index"),
            envelope: LazyAggregate::new("envelope"),
            snapshot_info: LazyAggregate::new("snapshot-info"),
        })
    }

    pub fn header(&self) -> &ProductHeader {
        &self.header
    }

    pub fn header_path(&self) -> &Path {
        &self.header_path
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    pub fn format(&self) -> &FormatId {
        &self.format
    }

    pub fn family(&self) -> ProductFamily {
        self.family
    }

    pub fn schema(&self) -> &Arc<BinarySchema> {
        &self.schema
    }

    pub fn descriptors(&self) -> &Arc<DescriptorTable> {
        &self.descriptors
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn kind(&self) -> &ProductKind {
        &self.kind
    }

    pub fn point_layout(&self) -> &PointLayout {
        &self.point
    }

    pub fn transform(&self) -> GridIdTransform {
        self.schema.grid_id_transform
    }

    pub fn data_len(&self) -> u64 {
        self.source.len()
    }

    /// Member index of the grid point record.
    pub fn point_member(&self, name: &str) -> Option<usize> {
        self.point.compound.member_index(name)
    }

    /// Member index of the observation record.
    pub fn observation_member(&self, name: &str) -> Option<usize> {
        self.point.observations.as_ref()?.element.member_index(name)
    }

    pub fn grid_index(&self) -> Result<Arc<GridPointIndex>> {
        self.grid_index.get_or_compute(|| self.build_index())
    }

    /// Coarse region covering every grid point of the product.
    pub fn envelope(&self) -> Result<Arc<Region>> {
        self.envelope.get_or_compute(|| self.build_envelope())
    }

    pub fn snapshot_info(&self) -> Result<Arc<SnapshotInfo>> {
        match &self.kind {
            ProductKind::Science(snapshots) => self
                .snapshot_info
                .get_or_compute(|| self.build_snapshot_info(snapshots)),
            _ => Err(Error::UnsupportedProduct {
                file_type: self.format.file_type.clone(),
                format: format!("{} has no snapshot list", self.format),
            }),
        }
    }

    fn build_index(&self) -> Result<GridPointIndex> {
        let window = WindowedSource::new(&self.source);
        let dec = Decoder::new(&window);
        let root = &self.schema.root;
        let expected = self.header.grid_point_count.unwrap_or(0) as usize;
        let mut builder = GridPointIndexBuilder::with_capacity(self.transform(), expected);

        match &self.layout {
            GridLayout::Flat { list } => {
                self.scan_list(&dec, &mut builder, 0, root, *list)?;
            }
            GridLayout::Zoned { zones, zone, list } => {
                let TypeRef::Sequence(seq) = &root.members()[*zones].ty else {
                    return Err(self.schema.missing_role("zone_list", "").into());
                };
                let count = dec.sequence_len(0, root, seq)?;
                let mut pos = dec.member_offset(0, root, *zones)?;
                for _ in 0..count {
                    let list_end = self.scan_list(&dec, &mut builder, pos, zone, *list)?;
                    let mut end = list_end;
                    for member in &zone.members()[*list + 1..] {
                        end += dec.type_size(end, &member.ty)?;
                    }
                    pos = end;
                }
            }
        }

        let index = builder.finish();
        info!(
            "Indexed {} grid points of {} (seqnum table {} entries)",
            index.len(),
            self.data_path.display(),
            index.table_len()
        );
        Ok(index)
    }

    /// Scan the grid point list `list` of the compound at `owner_offset`;
    /// returns the offset just past the list.
    fn scan_list<S: ByteSource + ?Sized>(
        &self,
        dec: &Decoder<'_, S>,
        builder: &mut GridPointIndexBuilder,
        owner_offset: u64,
        owner: &CompoundType,
        list: usize,
    ) -> Result<u64> {
        let list_name = &self.schema.roles.grid_point_list;
        let (seq, _) = sequence_of(&owner.members()[list].ty)
            .ok_or_else(|| self.schema.missing_role("grid_point_list", list_name))?;
        let SeqLength::Field(counter) = seq.length else {
            return Err(self.schema.missing_role("grid_point_counter", list_name).into());
        };
        let counter_leaf = owner.members()[counter]
            .ty
            .as_leaf()
            .ok_or_else(|| DecodeError::NotACount(owner.members()[counter].name.clone()))?;
        let counter_offset = dec.member_offset(owner_offset, owner, counter)?;
        let count = dec.sequence_len(owner_offset, owner, seq)?;
        let list_offset = dec.member_offset(owner_offset, owner, list)?;
        let first_record = builder.len();

        let point = &self.point.compound;
        let id_leaf = point.members()[self.point.id].ty.as_leaf().ok_or_else(|| {
            self.schema
                .missing_role("grid_point_id", &self.schema.roles.grid_point_id)
        })?;
        let mut pos = list_offset;
        for _ in 0..count {
            let size = dec.compound_size(pos, point)?;
            let id_at = dec.member_offset(pos, point, self.point.id)?;
            let raw = dec.read_value(id_at, id_leaf)?.as_u64().unwrap_or(u64::MAX);
            builder.push(
                raw,
                RecordSpan {
                    offset: pos,
                    len: size as u32,
                },
            )?;
            pos += size;
        }
        builder.push_list(ListSpan {
            counter_offset,
            counter_leaf,
            list_offset,
            list_end: pos,
            first_record,
            record_count: count,
        });
        Ok(pos)
    }

    fn build_envelope(&self) -> Result<Region> {
        let index = self.grid_index()?;
        let mut region = Region::new();
        for record in 0..index.len() {
            let (lon, lat) = self.location(&index, record)?;
            region.grow_to_point(lon, lat);
        }
        debug!("Envelope of {}: {} rectangles", self.data_path.display(), region.len());
        Ok(region)
    }

    fn build_snapshot_info(&self, snapshots: &SnapshotLayout) -> Result<SnapshotInfo> {
        let mut builder = SnapshotInfoBuilder::new();
        {
            let window = WindowedSource::new(&self.source);
            let dec = Decoder::new(&window);
            let root = &self.schema.root;
            let TypeRef::Sequence(seq) = &root.members()[snapshots.list].ty else {
                let name = &self.schema.roles.snapshot_list;
                return Err(self.schema.missing_role("snapshot_list", name).into());
            };
            let count = dec.sequence_len(0, root, seq)?;
            let list_offset = dec.member_offset(0, root, snapshots.list)?;
            let id_leaf = snapshots.info.members()[snapshots.id].ty.as_leaf();
            let mut pos = list_offset;
            for i in 0..count {
                let size = dec.compound_size(pos, &snapshots.info)?;
                if let Some(leaf) = id_leaf {
                    let at = dec.member_offset(pos, &snapshots.info, snapshots.id)?;
                    if let Some(id) = dec.read_value(at, leaf)?.as_u64() {
                        builder.list_entry(id as u32, i, pos);
                    }
                }
                pos += size;
            }
        }

        let index = self.grid_index()?;
        for record in 0..index.len() {
            let bytes = self.record_bytes(&index, record)?;
            let (lon, lat) = self.location_in(&bytes)?;
            for obs in self.decode_observations(&bytes, &[])? {
                builder.observe(obs.snapshot_id, obs.flags, lon, lat);
            }
        }
        let info = builder.finish();
        info!("Found {} snapshots in {}", info.len(), self.data_path.display());
        Ok(info)
    }

    fn record_bytes(&self, index: &GridPointIndex, record: usize) -> Result<Vec<u8>> {
        let span = index.span(record).ok_or(DecodeError::NoSuchElement {
            index: record,
            len: index.len(),
        })?;
        let mut buf = vec![0u8; span.len as usize];
        self.source.read_at(span.offset, &mut buf)?;
        Ok(buf)
    }

    /// Raw bytes of record `record`.
    pub fn read_record_bytes(&self, record: usize) -> Result<Vec<u8>> {
        let index = self.grid_index()?;
        self.record_bytes(&index, record)
    }

    /// Fully decoded grid point record.
    pub fn read_record(&self, record: usize) -> Result<Datum> {
        let bytes = self.read_record_bytes(record)?;
        let dec = Decoder::new(bytes.as_slice());
        Ok(dec.read_datum(0, &TypeRef::Compound(self.point.compound.clone()))?)
    }

    fn leaf_in(&self, bytes: &[u8], member: usize) -> Result<Value> {
        let point = &self.point.compound;
        let leaf = point
            .member(member)
            .and_then(|m| m.ty.as_leaf())
            .ok_or_else(|| DecodeError::NoSuchMember {
                compound: point.name().to_string(),
                index: member,
            })?;
        let dec = Decoder::new(bytes);
        let at = dec.member_offset(0, point, member)?;
        Ok(dec.read_value(at, leaf)?)
    }

    fn location_in(&self, bytes: &[u8]) -> Result<(f64, f64)> {
        let lon = self.leaf_in(bytes, self.point.longitude)?.as_f64();
        let lat = self.leaf_in(bytes, self.point.latitude)?.as_f64();
        Ok((lon, lat))
    }

    fn location(&self, index: &GridPointIndex, record: usize) -> Result<(f64, f64)> {
        let bytes = self.record_bytes(index, record)?;
        self.location_in(&bytes)
    }

    /// `(lon, lat)` of record `record`.
    pub fn point_location(&self, record: usize) -> Result<(f64, f64)> {
        let index = self.grid_index()?;
        self.location(&index, record)
    }

    fn decode_observations(&self, bytes: &[u8], members: &[usize]) -> Result<Vec<Observation>> {
        let Some(obs) = &self.point.observations else {
            return Ok(Vec::new());
        };
        let point = &self.point.compound;
        let TypeRef::Sequence(seq) = &point.members()[obs.list].ty else {
            return Ok(Vec::new());
        };
        let dec = Decoder::new(bytes);
        let count = dec.sequence_len(0, point, seq)?;
        let list_offset = dec.member_offset(0, point, obs.list)?;
        let element = &obs.element;

        type LeafResult = std::result::Result<Option<Value>, DecodeError>;
        let read_leaf = |at: u64, member: usize| -> LeafResult {

            match element.member(member).and_then(|m| m.ty.as_leaf()) {
                Some(leaf) => {
                    let pos = dec.member_offset(at, element, member)?;
                    dec.read_value(pos, leaf).map(Some)
                }
                None => Ok(None),
            }
        };

        let mut out = Vec::with_capacity(count);
        for k in 0..count {
            let at = dec.element_offset(list_offset, seq, count, k)?;
            let flags = read_leaf(at, obs.flags)?.and_then(|v| v.as_u64()).unwrap_or(0) as u32;
            let incidence_angle = match obs.incidence {
                Some(m) => read_leaf(at, m)?
                    .map(|v| obs.incidence_scaling.apply(v.as_f64()))
                    .unwrap_or(f64::NAN),
                None => f64::NAN,
            };
            let snapshot_id = match obs.snapshot_id {
                Some(m) => read_leaf(at, m)?.and_then(|v| v.as_u64()).unwrap_or(0) as u32,
                None => 0,
            };
            let mut values = Vec::with_capacity(members.len());
            for m in members {
                values.push(read_leaf(at, *m)?.map(|v| v.as_f64()).unwrap_or(f64::NAN));
            }
            out.push(Observation {
                flags,
                incidence_angle,
                snapshot_id,
                values,
            });
        }
        Ok(out)
    }

    /// Observation list of record `record` with the raw values of `members`.
    pub fn record_observations(
        &self,
        record: usize,
        members: &[usize],
    ) -> Result<Vec<Observation>> {

        let bytes = self.read_record_bytes(record)?;
        self.decode_observations(&bytes, members)
    }

    /// Visit every record in file order with its seqnum and raw bytes.
    /// Stops at the first error returned by `f`.
    pub fn for_each_record<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(usize, i32, &[u8]) -> Result<()>,
    {
        let index = self.grid_index()?;
        for (record, seqnum) in index.seqnums().iter().enumerate() {
            let bytes = self.record_bytes(&index, record)?;
            f(record, *seqnum, &bytes)?;
        }
        Ok(())
    }

    /// `(lon, lat)` stored in a record buffer.
    pub fn location_of(&self, bytes: &[u8]) -> Result<(f64, f64)> {
        self.location_in(bytes)
    }

    /// Leaf member `member` stored in a record buffer.
    pub fn member_of(&self, bytes: &[u8], member: usize) -> Result<Value> {
        self.leaf_in(bytes, member)
    }

    /// Copy the data block bytes `[from, to)` to `out`.
    pub fn copy_range<W: Write + ?Sized>(&self, from: u64, to: u64, out: &mut W) -> Result<()> {
        const CHUNK: u64 = 1 << 20;
        let mut buf = Vec::new();
        let mut pos = from;
        while pos < to {
            let n = (to - pos).min(CHUNK) as usize;
            buf.resize(n, 0);
            self.source.read_at(pos, &mut buf)?;
            out.write_all(&buf)?;
            pos += n as u64;
        }
        Ok(())
    }

    /// Observation list stored in a record buffer.
    pub fn observations_of(&self, bytes: &[u8], members: &[usize]) -> Result<Vec<Observation>> {
        self.decode_observations(bytes, members)
    }

    /// Acquisition time of snapshot `id`, when it is in the snapshot list.
    pub fn snapshot_time(&self, id: u32) -> Result<Option<NaiveDateTime>> {
        let ProductKind::Science(snapshots) = &self.kind else {
            return Ok(None);
        };
        let Some(time_member) = snapshots.time else {
            return Ok(None);
        };
        let info = self.snapshot_info()?;
        let Some(position) = info.position(id) else {
            return Ok(None);
        };
        let dec = Decoder::new(&self.source);
        let at = dec.member_offset(position.offset, &snapshots.info, time_member)?;
        let ty = &snapshots.info.members()[time_member].ty;
        let datum = dec.read_datum(at, ty)?;
        Ok(snapshot_datetime(&datum))
    }
}

/// Days since 2000-01-01, seconds of day and microseconds of a time compound.
fn snapshot_datetime(datum: &Datum) -> Option<NaiveDateTime> {
    let part = |i: usize| datum.member(i).and_then(Datum::leaf).and_then(|v| v.as_i64());
    let (days, seconds, micros) = (part(0)?, part(1).unwrap_or(0), part(2).unwrap_or(0));
    let (y, m, d) = SNAPSHOT_EPOCH;
    NaiveDate::from_ymd_opt(y, m, d)?
        .and_hms_opt(0, 0, 0)?
        .checked_add_signed(Duration::days(days))?
        .checked_add_signed(Duration::seconds(seconds))?
        .checked_add_signed(Duration::microseconds(micros))
}

impl RecordSource for ProductFile {
    fn read_member(&self, seqnum: i32, member: usize) -> Result<Option<Value>> {
        let index = self.grid_index()?;
        let Some(record) = index.record(seqnum) else {
            return Ok(None);
        };
        let bytes = self.record_bytes(&index, record)?;
        self.leaf_in(&bytes, member).map(Some)
    }

    fn observations(&self, seqnum: i32, members: &[usize]) -> Result<Option<Vec<Observation>>> {
        let index = self.grid_index()?;
        let Some(record) = index.record(seqnum) else {
            return Ok(None);
        };
        let bytes = self.record_bytes(&index, record)?;
        self.decode_observations(&bytes, members).map(Some)
    }
}
