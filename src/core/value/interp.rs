//! Incidence-angle interpolation of multi-angle observations.

/// Observations outside this incidence range are ignored.
pub const MIN_INCIDENCE: f64 = 37.5;
pub const MAX_INCIDENCE: f64 = 52.5;
pub const REFERENCE_INCIDENCE: f64 = 42.5;

pub fn in_window(angle: f64) -> bool {
    (MIN_INCIDENCE..=MAX_INCIDENCE).contains(&angle)
}

/// Least-squares fit of value against incidence angle over the samples in
/// the window, evaluated at the reference angle. Needs at least one sample
/// at or below the reference and one above it.
pub fn interpolate_at_reference<I>(samples: I) -> Option<f64>
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let pts: Vec<(f64, f64)> = samples
        .into_iter()
        .filter(|(a, v)| in_window(*a) && !v.is_nan())
        .collect();
    let below = pts.iter().any(|(a, _)| *a <= REFERENCE_INCIDENCE);
    let above = pts.iter().any(|(a, _)| *a > REFERENCE_INCIDENCE);
    if !(below && above) {
        return None;
    }
    let n = pts.len() as f64;
    let mx = pts.iter().map(|(a, _)| a).sum::<f64>() / n;
    let my = pts.iter().map(|(_, v)| v).sum::<f64>() / n;
    let (sxx, sxy) = pts.iter().fold((0.0, 0.0), |(sxx, sxy), (a, v)| {
        let dx = a - mx;
        (sxx + dx * dx, sxy + dx * (v - my))
    });
    if sxx <= 0.0 {
        return None;
    }
    Some(my + sxy / sxx * (REFERENCE_INCIDENCE - mx))
}

/// Bitwise OR of flag words over the samples in the window.
pub fn or_flags<I>(samples: I) -> Option<u64>
where
    I: IntoIterator<Item = (f64, u64)>,
{
    samples
        .into_iter()
        .filter(|(a, _)| in_window(*a))
        .map(|(_, f)| f)
        .reduce(|acc, f| acc | f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needs_both_sides_of_reference() {
        assert_eq!(interpolate_at_reference([(40.0, 100.0), (41.0, 101.0)]), None);
        assert_eq!(interpolate_at_reference([(42.5, 100.0)]), None);
        assert_eq!(interpolate_at_reference([(43.0, 100.0), (50.0, 120.0)]), None);
        assert_eq!(interpolate_at_reference(Vec::new()), None);
    }

    #[test]
    fn two_point_fit() {
        let v = interpolate_at_reference([(40.0, 100.0), (45.0, 110.0)]).unwrap();
        assert!((v - 105.0).abs() < 1e-12);
        let only_low = [(40.0, 100.0), (41.0, 102.0)];
        assert!(interpolate_at_reference(only_low).is_none());
        let with_high = [(40.0, 100.0), (41.0, 102.0), (44.0, 108.0)];
        // slope 2, intercept 20: 2 * 42.5 + 20
        let v = interpolate_at_reference(with_high).unwrap();
        assert!((v - 105.0).abs() < 1e-9);
    }

    #[test]
    fn window_excludes_outliers() {
        let samples = [(30.0, 0.0), (40.0, 100.0), (45.0, 110.0), (60.0, 0.0)];
        let v = interpolate_at_reference(samples).unwrap();

        assert!((v - 105.0).abs() < 1e-12);
        let v = interpolate_at_reference([(37.5, 95.0), (52.5, 125.0)]).unwrap();
        assert!((v - 105.0).abs() < 1e-12);
    }

    #[test]
    fn flags_are_ored() {
        assert_eq!(or_flags([(40.0, 0b001), (45.0, 0b100), (20.0, 0b010)]), Some(0b101));
        assert_eq!(or_flags([(20.0, 0b010)]), None);
    }
}
