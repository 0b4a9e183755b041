//! Dense seqnum → record index table.
//!
//! The table spans only the seqnum range present in the product
//! (`max - min + 1` entries) and holds a record index or -1.
use crate::error::{Error, Result};
use crate::io::decoder::LeafType;

use super::dgg::GridIdTransform;

/// Byte range of one grid point record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSpan {
    pub offset: u64,
    pub len: u32,
}

/// One counted grid point list (the whole list of a flat product or one zone)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSpan {
    pub counter_offset: u64,
    pub counter_leaf: LeafType,
    pub list_offset: u64,
    pub list_end: u64,
    pub first_record: usize,
    pub record_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct GridPointIndex {
    min_seqnum: i32,
    table: Vec<i32>,
    seqnums: Vec<i32>,
    spans: Vec<RecordSpan>,
    lists: Vec<ListSpan>,
}

impl GridPointIndex {
    /// Record index of `seqnum`, or -1 when the product has no such point.
    pub fn lookup(&self, seqnum: i32) -> i32 {
        let rel = seqnum as i64 - self.min_seqnum as i64;
        if rel < 0 {
            return -1;
        }
        self.table.get(rel as usize).copied().unwrap_or(-1)
    }

    pub fn record(&self, seqnum: i32) -> Option<usize> {
        let i = self.lookup(seqnum);
        (i >= 0).then_some(i as usize)
    }

    pub fn seqnum_of(&self, record: usize) -> Option<i32> {
        self.seqnums.get(record).copied()
    }

    pub fn span(&self, record: usize) -> Option<RecordSpan> {
        self.spans.get(record).copied()
    }

    pub fn seqnums(&self) -> &[i32] {
        &self.seqnums
    }

    pub fn lists(&self) -> &[ListSpan] {
        &self.lists
    }

    pub fn len(&self) -> usize {
        self.seqnums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seqnums.is_empty()
    }

    pub fn min_seqnum(&self) -> Option<i32> {
        (!self.table.is_empty()).then_some(self.min_seqnum)
    }

    pub fn max_seqnum(&self) -> Option<i32> {
        (!self.table.is_empty()).then(|| self.min_seqnum + self.table.len() as i32 - 1)
    }

    /// Size of the dense table in entries.
    pub fn table_len(&self) -> usize {
        self.table.len()
    }
}

/// Collects ids and offsets during the file scan.
#[derive(Debug)]
pub struct GridPointIndexBuilder {
    transform: GridIdTransform,
    seqnums: Vec<i32>,
    spans: Vec<RecordSpan>,
    lists: Vec<ListSpan>,
    min: i32,
    max: i32,
}

impl GridPointIndexBuilder {
    pub fn new(transform: GridIdTransform) -> Self {
        Self {
            transform,
            seqnums: Vec::new(),
            spans: Vec::new(),
            lists: Vec::new(),
            min: i32::MAX,
            max: i32::MIN,
        }
    }

    pub fn with_capacity(transform: GridIdTransform, n: usize) -> Self {
        let mut b = Self::new(transform);
        b.seqnums.reserve(n);
        b.spans.reserve(n);
        b
    }

    pub fn len(&self) -> usize {
        self.seqnums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seqnums.is_empty()
    }

    /// Register the next record. An id outside the valid range aborts the
    /// whole index.
    pub fn push(&mut self, raw_id: u64, span: RecordSpan) -> Result<i32> {
        let record = self.seqnums.len();
        let seqnum = self
            .transform
            .to_seqnum(raw_id)
            .ok_or(Error::InvalidGridPointId { id: raw_id, record })?;
        self.min = self.min.min(seqnum);
        self.max = self.max.max(seqnum);
        self.seqnums.push(seqnum);
        self.spans.push(span);
        Ok(seqnum)
    }

    pub fn push_list(&mut self, list: ListSpan) {
        self.lists.push(list);
    }

    pub fn finish(self) -> GridPointIndex {
        if self.seqnums.is_empty() {
            return GridPointIndex {
                lists: self.lists,
                ..GridPointIndex::default()
            };
        }
        let mut table = vec![-1i32; (self.max - self.min + 1) as usize];
        for (i, s) in self.seqnums.iter().enumerate() {
            table[(s - self.min) as usize] = i as i32;
        }
        GridPointIndex {
            min_seqnum: self.min,
            table,
            seqnums: self.seqnums,
            spans: self.spans,
            lists: self.lists,
        }
    }
}
