use super::Observation;
use crate::types::PolMode;

/// Observation of `snapshot_id` in the given polarization. Snapshot ids of
/// one grid point ascend, so ids outside `[first, last]` are rejected before
/// scanning.
pub fn select_snapshot(
    obs: &[Observation],
    snapshot_id: u32,
    pol: PolMode,
) -> Option<&Observation> {

    let first = obs.first()?;
    let last = obs.last()?;
    if snapshot_id < first.snapshot_id || snapshot_id > last.snapshot_id {
        return None;
    }
    obs.iter()
        .find(|o| o.snapshot_id == snapshot_id && pol.matches(o.flags))
}

/// Browse products hold one observation per polarization.
pub fn select_browse(obs: &[Observation], pol: PolMode) -> Option<&Observation> {
    obs.iter().find(|o| pol.matches(o.flags))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(flags: u32, id: u32) -> Observation {
        Observation {
            flags,
            incidence_angle: 40.0,
            snapshot_id: id,
            values: vec![id as f64],
        }
    }

    #[test]
    fn finds_snapshot_and_polarization() {
        let list = vec![obs(0, 10), obs(1, 10), obs(0, 12), obs(2, 14), obs(1, 15)];
        assert_eq!(select_snapshot(&list, 10, PolMode::Y), Some(&list[1]));
        assert_eq!(select_snapshot(&list, 14, PolMode::Xy), Some(&list[3]));
        assert_eq!(select_snapshot(&list, 14, PolMode::X), None);
        assert_eq!(select_snapshot(&list, 9, PolMode::X), None);
        assert_eq!(select_snapshot(&list, 16, PolMode::Y), None);
        assert_eq!(select_snapshot(&[], 1, PolMode::X), None);
    }

    #[test]
    fn browse_picks_first_match() {
        let list = vec![obs(0, 0), obs(1, 0), obs(3, 0)];
        assert_eq!(select_browse(&list, PolMode::Xy), Some(&list[2]));
        assert_eq!(select_browse(&list[..1], PolMode::Y), None);
    }
}
