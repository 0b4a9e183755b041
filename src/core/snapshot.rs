//! Per-file snapshot index of science products.
//!
//! Built once by scanning every grid point's observation list: the distinct
//! snapshot ids per polarization, the area each snapshot touches and where
//! each snapshot record sits in the product's snapshot list.
use std::collections::{BTreeSet, HashMap};

use tracing::{debug, warn};

use crate::core::grid::GeoRect;
use crate::types::PolMode;

/// Position of a snapshot record in the snapshot list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotPosition {
    pub index: usize,
    pub offset: u64,
}

#[derive(Debug, Clone, Default)]
pub struct SnapshotInfo {
    all: BTreeSet<u32>,
    x: BTreeSet<u32>,
    y: BTreeSet<u32>,
    xy: BTreeSet<u32>,
    areas: HashMap<u32, GeoRect>,
    positions: HashMap<u32, SnapshotPosition>,
}

impl SnapshotInfo {
    pub fn snapshot_ids(&self) -> &BTreeSet<u32> {
        &self.all
    }

    pub fn ids_for(&self, pol: PolMode) -> &BTreeSet<u32> {
        match pol {
            PolMode::X => &self.x,
            PolMode::Y => &self.y,
            PolMode::Xy => &self.xy,
        }
    }

    pub fn contains(&self, id: u32) -> bool {
        self.all.contains(&id)
    }

    /// Bounding rectangle of every grid point observed in snapshot `id`.
    pub fn area(&self, id: u32) -> Option<GeoRect> {
        self.areas.get(&id).copied()
    }

    pub fn position(&self, id: u32) -> Option<SnapshotPosition> {
        self.positions.get(&id).copied()
    }

    pub fn first_id(&self) -> Option<u32> {
        self.all.first().copied()
    }

    pub fn last_id(&self) -> Option<u32> {
        self.all.last().copied()
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct SnapshotInfoBuilder {
    info: SnapshotInfo,
    listed: HashMap<u32, SnapshotPosition>,
}

impl SnapshotInfoBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entry of the product's snapshot list.
    pub fn list_entry(&mut self, id: u32, index: usize, offset: u64) {
        self.listed.insert(id, SnapshotPosition { index, offset });
    }

    /// Record one observation of the grid point at `(lon, lat)`.
    pub fn observe(&mut self, id: u32, flags: u32, lon: f64, lat: f64) {
        let info = &mut self.info;
        info.all.insert(id);
        match PolMode::from_flags(flags) {
            PolMode::X => info.x.insert(id),
            PolMode::Y => info.y.insert(id),
            PolMode::Xy => info.xy.insert(id),
        };
        let rect = GeoRect::around_point(lon, lat);
        info.areas
            .entry(id)
            .and_modify(|area| *area = area.union(&rect))
            .or_insert(rect);
    }

    pub fn finish(self) -> SnapshotInfo {
        let mut info = self.info;
        let mut missing = 0usize;
        for id in &info.all {
            match self.listed.get(id) {
                Some(pos) => {
                    info.positions.insert(*id, *pos);
                }
                None => {
                    missing += 1;
                    debug!("Snapshot {} is not in the snapshot list", id);
                }
            }
        }
        if missing > 0 {
            warn!("{} observed snapshot ids have no snapshot list entry", missing);
        }
        info
    }
}
