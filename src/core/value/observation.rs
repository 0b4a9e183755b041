use std::sync::Arc;

use tracing::trace;

use super::interp::{interpolate_at_reference, or_flags};
use super::select::{select_browse, select_snapshot};
use super::{Observation, ObservationMember, ObservationView, RecordSource, ValueAccessor};
use crate::types::PolMode;

/// Member of the per-grid-point observation list, reduced to one value per
/// cell through an [`ObservationView`].
#[derive(Clone)]
pub struct ObservationAccessor {
    source: Arc<dyn RecordSource>,
    view: ObservationView,
    pol: PolMode,
    member: ObservationMember,
    flags: bool,
}

impl ObservationAccessor {
    pub fn new(
        source: Arc<dyn RecordSource>,
        view: ObservationView,
        pol: PolMode,
        member: ObservationMember,
    ) -> Self {
        Self {
            source,
            view,
            pol,
            member,
            flags: false,
        }
    }

    /// Treat the member as a flag word: interpolation becomes a bitwise OR.
    pub fn flag_band(mut self) -> Self {
        self.flags = true;
        self
    }

    fn reduce(&self, list: &[Observation]) -> Option<f64> {
        match self.view {
            ObservationView::Interpolated if self.flags => or_flags(
                list.iter()
                    .filter(|o| self.pol.matches(o.flags))
                    .filter_map(|o| {
                        let raw = *o.values.first()?;
                        self.member.apply(raw).map(|v| (o.incidence_angle, v as u64))
                    }),
            )
            .map(|bits| bits as f64),
            ObservationView::Interpolated => interpolate_at_reference(
                list.iter()
                    .filter(|o| self.pol.matches(o.flags))
                    .filter_map(|o| {
                        let raw = *o.values.first()?;
                        self.member.apply(raw).map(|v| (o.incidence_angle, v))
                    }),
            ),
            ObservationView::Browse => select_browse(list, self.pol)
                .and_then(|o| o.values.first().copied())
                .and_then(|raw| self.member.apply(raw)),
            ObservationView::Snapshot(id) => select_snapshot(list, id, self.pol)
                .and_then(|o| o.values.first().copied())
                .and_then(|raw| self.member.apply(raw)),
        }
    }
}

impl ValueAccessor<f64> for ObservationAccessor {
    fn get(&self, seqnum: i32, no_data: f64) -> f64 {
        match self.source.observations(seqnum, &[self.member.index]) {
            Ok(Some(list)) => self.reduce(&list).unwrap_or(no_data),
            Ok(None) => no_data,
            Err(e) => {
                trace!("observations of cell {}: {}", seqnum, e);
                no_data
            }
        }
    }
}
