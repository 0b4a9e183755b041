//! Binary subset export: a copy of a product restricted to some of its grid
//! points. The data block keeps the original layout; only the grid point
//! counters change and the filtered lists are rewritten. The header is
//! patched with the new point count, bounds and validity period.
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::core::grid::GeoRect;
use crate::error::{Error, Result};
use crate::io::decoder::Value;
use crate::io::header::HeaderPatch;
use crate::io::product::{ProductFile, ProductKind};
use crate::types::CancelFlag;

/// Files written by [`write_subset`]
#[derive(Debug, Clone)]
pub struct SubsetSummary {
    pub header_path: PathBuf,
    pub data_path: PathBuf,
    pub grid_points: usize,
    pub bounds: Option<GeoRect>,
}

#[derive(Default)]
struct Coverage {
    bounds: Option<GeoRect>,
    snapshots: Option<(u32, u32)>,
}

impl Coverage {
    fn add_point(&mut self, lon: f64, lat: f64) {
        let p = GeoRect::new(lon, lat, lon, lat);
        self.bounds = Some(match self.bounds {
            Some(b) => b.union(&p),
            None => p,
        });
    }

    fn add_snapshot(&mut self, id: u32) {
        self.snapshots = Some(match self.snapshots {
            Some((lo, hi)) => (lo.min(id), hi.max(id)),
            None => (id, id),
        });
    }
}

fn file_name(path: &Path) -> Result<&std::ffi::OsStr> {
    path.file_name().ok_or_else(|| Error::InvalidArgument {
        arg: "product",
        value: path.display().to_string(),
    })
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Write the grid points `records` (record indices) of `product` into
/// `out_dir`, under the product's own file names.
pub fn write_subset(
    product: &ProductFile,
    records: &[usize],
    out_dir: &Path,
    cancel: &CancelFlag,
) -> Result<SubsetSummary> {
    let header_path = out_dir.join(file_name(product.header_path())?);
    let data_path = out_dir.join(file_name(product.data_path())?);
    if same_file(&header_path, product.header_path()) || same_file(&data_path, product.data_path())
    {
        return Err(Error::InvalidArgument {
            arg: "output",
            value: format!("{} would overwrite the source product", out_dir.display()),
        });
    }

    let mut kept = records.to_vec();
    kept.sort_unstable();
    kept.dedup();

    let index = product.grid_index()?;
    let science = matches!(product.kind(), ProductKind::Science(_));
    let mut coverage = Coverage::default();

    let mut data_tmp = NamedTempFile::new_in(out_dir)?;
    {
        let mut w = BufWriter::new(data_tmp.as_file_mut());
        let mut prev_end = 0u64;
        let mut next = 0usize;
        for list in index.lists() {
            let end_record = list.first_record + list.record_count;
            let start = next;
            while next < kept.len() && kept[next] < end_record {
                next += 1;
            }
            let in_list: Vec<usize> = kept[start..next]
                .iter()
                .copied()
                .filter(|r| *r >= list.first_record)
                .collect();

            product.copy_range(prev_end, list.counter_offset, &mut w)?;
            let kept_here = in_list.len();
            let counter = Value::integer(list.counter_leaf, kept_here as u64).ok_or_else(|| {
                Error::Processing(format!("{kept_here} grid points do not fit the list counter"))
            })?;
            let mut bytes = Vec::with_capacity(8);
            counter.write_le(&mut bytes);
            w.write_all(&bytes)?;
            let counter_end = list.counter_offset + list.counter_leaf.size() as u64;
            product.copy_range(counter_end, list.list_offset, &mut w)?;

            for record in &in_list {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                let bytes = product.read_record_bytes(*record)?;
                let (lon, lat) = product.location_of(&bytes)?;
                coverage.add_point(lon, lat);
                if science {
                    for obs in product.observations_of(&bytes, &[])? {
                        coverage.add_snapshot(obs.snapshot_id);
                    }
                }
                w.write_all(&bytes)?;
            }
            debug!(
                "Kept {} of {} grid points of list at {}",
                kept_here, list.record_count, list.list_offset
            );

            prev_end = list.list_end;
        }
        product.copy_range(prev_end, product.data_len(), &mut w)?;
        w.flush()?;
    }

    let (validity_start, validity_stop) = match coverage.snapshots {
        Some((first, last)) => (product.snapshot_time(first)?, product.snapshot_time(last)?),
        None => (None, None),
    };
    let patch = HeaderPatch {
        file_name: header_path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string),
        validity_start,
        validity_stop,
        grid_point_count: Some(kept.len() as u64),
        bounds: coverage.bounds,
    };
    let xml = std::fs::read_to_string(product.header_path())?;
    let patched = patch.apply(&xml)?;
    let mut header_tmp = NamedTempFile::new_in(out_dir)?;
    header_tmp.write_all(patched.as_bytes())?;
    header_tmp.flush()?;

    data_tmp.persist(&data_path).map_err(|e| e.error)?;
    header_tmp.persist(&header_path).map_err(|e| e.error)?;
    info!(
        "Wrote subset {} ({} grid points{})",
        data_path.display(),
        kept.len(),
        validity_note(validity_start, validity_stop)
    );
    Ok(SubsetSummary {
        header_path,
        data_path,
        grid_points: kept.len(),
        bounds: coverage.bounds,
    })
}

fn validity_note(start: Option<NaiveDateTime>, stop: Option<NaiveDateTime>) -> String {
    match (start, stop) {
        (Some(a), Some(b)) => format!(", {} to {}", a, b),
        _ => String::new(),
    }
}
