use std::sync::Arc;

use tracing::trace;

use super::{RecordSource, ValueAccessor};
use crate::types::Split64;

/// Scalar member of the grid point record
#[derive(Clone)]
pub struct FieldAccessor {
    source: Arc<dyn RecordSource>,
    member: usize,
    split: Split64,
    fill: Option<f64>,
}

impl FieldAccessor {
    pub fn new(source: Arc<dyn RecordSource>, member: usize) -> Self {
        Self {
            source,
            member,
            split: Split64::Full64,
            fill: None,
        }
    }

    /// Expose only part of a 64-bit member.
    pub fn with_split(mut self, split: Split64) -> Self {
        self.split = split;
        self
    }

    /// Raw value treated as missing.
    pub fn with_fill(mut self, fill: Option<f64>) -> Self {
        self.fill = fill;
        self
    }
}

impl ValueAccessor<f64> for FieldAccessor {
    fn get(&self, seqnum: i32, no_data: f64) -> f64 {
        let value = match self.source.read_member(seqnum, self.member) {
            Ok(Some(v)) => v,
            Ok(None) => return no_data,
            Err(e) => {
                trace!("member {} of cell {}: {}", self.member, seqnum, e);
                return no_data;
            }
        };
        let raw = match (self.split, value.bits64()) {
            (Split64::Full64, _) | (_, None) => value.as_f64(),
            (split, Some(bits)) => split.apply(bits) as f64,
        };
        if self.fill == Some(raw) { no_data } else { raw }
    }
}
