//! Rotation of X/Y brightness temperatures into the H/V basis.
//!
//! The per-axis net rotation is `alpha = Faraday - geometric`; the two axes
//! are averaged into `a = (cos αx + cos αy) / 2` and `b = (sin αx + sin αy) / 2`.
//! Inputs are the per-polarization values interpolated at the reference
//! incidence angle.
use std::sync::Arc;

use num_complex::Complex;
use tracing::trace;

use super::interp::interpolate_at_reference;
use super::{Observation, ObservationMember, RecordSource, ValueAccessor};
use crate::types::{PolMode, RotatedChannel};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationCoefficients {
    pub aa: f64,
    pub bb: f64,
    pub ab: f64,
}

impl RotationCoefficients {
    /// Angles in degrees.
    pub fn from_angles(faraday_x: f64, geometric_x: f64, faraday_y: f64, geometric_y: f64) -> Self {
        let alpha_x = (faraday_x - geometric_x).to_radians();
        let alpha_y = (faraday_y - geometric_y).to_radians();
        let a = (alpha_x.cos() + alpha_y.cos()) / 2.0;
        let b = (alpha_x.sin() + alpha_y.sin()) / 2.0;
        Self {
            aa: a * a,
            bb: b * b,
            ab: a * b,
        }
    }
}

/// Per-polarization values feeding the rotation. `bt_xy` and `ra_xy` are
/// absent for dual-polarization products.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationInputs {
    pub bt_x: f64,
    pub bt_y: f64,
    pub bt_xy: Option<Complex<f64>>,
    pub ra_x: f64,
    pub ra_y: f64,
    pub ra_xy: Option<f64>,
    pub faraday_x: f64,
    pub geometric_x: f64,
    pub faraday_y: f64,
    pub geometric_y: f64,
}

impl RotationInputs {
    pub fn coefficients(&self) -> RotationCoefficients {
        RotationCoefficients::from_angles(
            self.faraday_x,
            self.geometric_x,
            self.faraday_y,
            self.geometric_y,
        )
    }

    /// Value of one output channel; `None` when the channel needs the
    /// cross-polarization term and it is missing.
    pub fn rotate(&self, channel: RotatedChannel) -> Option<f64> {
        let RotationCoefficients { aa, bb, ab } = self.coefficients();
        let (x, y) = (self.bt_x, self.bt_y);
        let (rax, ray) = (self.ra_x, self.ra_y);
        match (self.bt_xy, self.ra_xy) {
            (Some(xy), ra_xy) => {
                let raxy = ra_xy.unwrap_or(f64::NAN);
                let cross = 4.0 * ab * ab * raxy * raxy;
                Some(match channel {
                    RotatedChannel::BtH => aa * x - 2.0 * ab * xy.re + bb * y,
                    RotatedChannel::BtV => bb * x + 2.0 * ab * xy.re + aa * y,
                    RotatedChannel::BtHvReal => ab * (x - y) + (aa - bb) * xy.re,
                    RotatedChannel::BtHvImag => (aa + bb) * xy.im,
                    RotatedChannel::AccuracyH => {
                        (aa * aa * rax * rax + cross + bb * bb * ray * ray).sqrt()
                    }
                    RotatedChannel::AccuracyV | RotatedChannel::AccuracyHv => {
                        (bb * bb * rax * rax + cross + aa * aa * ray * ray).sqrt()
                    }
                })
                .filter(|v| !v.is_nan())
            }
            (None, _) => match channel {
                RotatedChannel::BtH => Some(aa * x - bb * y),
                RotatedChannel::BtV => Some(bb * x + aa * y),
                RotatedChannel::AccuracyH => {
                    Some((aa * aa * rax * rax + bb * bb * ray * ray).sqrt())
                }
                RotatedChannel::AccuracyV => {
                    Some((bb * bb * rax * rax + aa * aa * ray * ray).sqrt())
                }
                _ => None,
            },
        }
    }
}

/// Observation members used by the rotation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationMembers {
    pub bt_real: ObservationMember,
    /// Imaginary part of the cross-polarization, full-pol products only
    pub bt_imag: Option<ObservationMember>,
    pub accuracy: ObservationMember,
    pub faraday: ObservationMember,
    pub geometric: ObservationMember,
}

impl RotationMembers {
    fn indices(&self) -> Vec<usize> {
        let mut out = vec![
            self.bt_real.index,
            self.accuracy.index,
            self.faraday.index,
            self.geometric.index,
        ];
        if let Some(imag) = self.bt_imag {
            out.push(imag.index);
        }
        out
    }
}

/// Rotated brightness temperature or accuracy channel
#[derive(Clone)]
pub struct RotatedBt {
    source: Arc<dyn RecordSource>,
    members: RotationMembers,
    channel: RotatedChannel,
}

// positions in the observation value vector
const BT: usize = 0;
const RA: usize = 1;
const FARADAY: usize = 2;
const GEOMETRIC: usize = 3;
const BT_IMAG: usize = 4;

impl RotatedBt {
    pub fn new(
        source: Arc<dyn RecordSource>,
        members: RotationMembers,
        channel: RotatedChannel,
    ) -> Self {
        Self {
            source,
            members,
            channel,
        }
    }

    fn interpolated(
        &self,
        list: &[Observation],
        pol: PolMode,
        slot: usize,
        member: &ObservationMember,
    ) -> Option<f64> {
        interpolate_at_reference(
            list.iter()
                .filter(|o| pol.matches(o.flags))
                .filter_map(|o| member.apply(*o.values.get(slot)?).map(|v| (o.incidence_angle, v))),
        )
    }

    fn inputs(&self, list: &[Observation]) -> Option<RotationInputs> {
        let m = &self.members;
        let bt_x = self.interpolated(list, PolMode::X, BT, &m.bt_real)?;
        let bt_y = self.interpolated(list, PolMode::Y, BT, &m.bt_real)?;
        let ra_x = self.interpolated(list, PolMode::X, RA, &m.accuracy)?;
        let ra_y = self.interpolated(list, PolMode::Y, RA, &m.accuracy)?;
        let faraday_x = self.interpolated(list, PolMode::X, FARADAY, &m.faraday)?;
        let faraday_y = self.interpolated(list, PolMode::Y, FARADAY, &m.faraday)?;
        let geometric_x = self.interpolated(list, PolMode::X, GEOMETRIC, &m.geometric)?;
        let geometric_y = self.interpolated(list, PolMode::Y, GEOMETRIC, &m.geometric)?;
        let (bt_xy, ra_xy) = match &m.bt_imag {
            Some(imag) => {
                let re = self.interpolated(list, PolMode::Xy, BT, &m.bt_real);
                let im = self.interpolated(list, PolMode::Xy, BT_IMAG, imag);
                let ra = self.interpolated(list, PolMode::Xy, RA, &m.accuracy);
                match (re, im) {
                    (Some(re), Some(im)) => (Some(Complex::new(re, im)), ra),
                    // full-pol channels without a cross-pol term cannot be produced
                    _ => return None,
                }
            }
            None => (None, None),
        };
        Some(RotationInputs {
            bt_x,
            bt_y,
            bt_xy,
            ra_x,
            ra_y,
            ra_xy,
            faraday_x,
            geometric_x,
            faraday_y,
            geometric_y,
        })
    }
}

impl ValueAccessor<f64> for RotatedBt {
    fn get(&self, seqnum: i32, no_data: f64) -> f64 {
        let list = match self.source.observations(seqnum, &self.members.indices()) {
            Ok(Some(list)) => list,
            Ok(None) => return no_data,
            Err(e) => {
                trace!("observations of cell {}: {}", seqnum, e);
                return no_data;
            }
        };
        self.inputs(&list)
            .and_then(|inputs| inputs.rotate(self.channel))
            .unwrap_or(no_data)
    }
}
