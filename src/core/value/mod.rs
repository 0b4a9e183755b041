//! Typed value accessors and derived-value computation.
//!
//! Every accessor answers `get(seqnum, no_data)` and never propagates a decode
//! error: anything that cannot be produced comes back as `no_data`.
//! Accessors compute in `f64` (NaN meaning "missing") and are converted to
//! the raster sample type by [`AsSample`].
use std::fmt::Debug;
use std::sync::Arc;

use num_traits::NumCast;

use crate::error::Result;
use crate::io::decoder::Value;

pub mod field;
pub mod interp;
pub mod observation;
pub mod rotation;
pub mod scale;
pub mod select;

pub use field::FieldAccessor;
pub use interp::{REFERENCE_INCIDENCE, interpolate_at_reference};
pub use observation::ObservationAccessor;
pub use rotation::{RotatedBt, RotationCoefficients, RotationInputs, RotationMembers};
pub use scale::Scaled;
pub use select::{select_browse, select_snapshot};

/// Raster sample types
pub trait Sample: Copy + Send + Sync + PartialEq + Debug + NumCast + 'static {
    /// Convert a computed value; `None` for NaN or values outside the type.
    fn from_computed(v: f64) -> Option<Self>;

    fn as_f64(self) -> f64;
}

macro_rules! int_sample {
    ($($t:ty),*) => {$(
        impl Sample for $t {
            fn from_computed(v: f64) -> Option<Self> {
                if v.is_nan() {
                    None
                } else {
                    <$t as NumCast>::from(v.round())
                }
            }

            fn as_f64(self) -> f64 {
                self as f64
            }
        }
    )*};
}

int_sample!(i8, i16, i32);

impl Sample for f32 {
    fn from_computed(v: f64) -> Option<Self> {
        (!v.is_nan()).then_some(v as f32)
    }

    fn as_f64(self) -> f64 {
        self as f64
    }
}

impl Sample for f64 {
    fn from_computed(v: f64) -> Option<Self> {
        (!v.is_nan()).then_some(v)
    }

    fn as_f64(self) -> f64 {
        self
    }
}

pub trait ValueAccessor<T: Sample>: Send + Sync {
    fn get(&self, seqnum: i32, no_data: T) -> T;
}

impl<T: Sample, A: ValueAccessor<T> + ?Sized> ValueAccessor<T> for Arc<A> {
    fn get(&self, seqnum: i32, no_data: T) -> T {
        (**self).get(seqnum, no_data)
    }
}

impl<T: Sample, A: ValueAccessor<T> + ?Sized> ValueAccessor<T> for Box<A> {
    fn get(&self, seqnum: i32, no_data: T) -> T {
        (**self).get(seqnum, no_data)
    }
}

impl<T: Sample, A: ValueAccessor<T> + ?Sized> ValueAccessor<T> for &A {
    fn get(&self, seqnum: i32, no_data: T) -> T {
        (**self).get(seqnum, no_data)
    }
}

/// Adapts an `f64` accessor to any sample type.
#[derive(Debug, Clone)]
pub struct AsSample<A>(pub A);

impl<T: Sample, A: ValueAccessor<f64>> ValueAccessor<T> for AsSample<A> {
    fn get(&self, seqnum: i32, no_data: T) -> T {
        T::from_computed(self.0.get(seqnum, f64::NAN)).unwrap_or(no_data)
    }
}

/// One observation of a grid point with the requested member values.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub flags: u32,
    /// Degrees; NaN when the product carries no incidence angle
    pub incidence_angle: f64,
    pub snapshot_id: u32,
    /// Raw values of the requested members, in request order
    pub values: Vec<f64>,
}

/// Record access used by accessors, implemented by products.
pub trait RecordSource: Send + Sync {
    /// Raw leaf value of a grid point record member; `Ok(None)` when the
    /// product has no record for `seqnum`.
    fn read_member(&self, seqnum: i32, member: usize) -> Result<Option<Value>>;

    /// Observation list of a grid point with the raw values of the given
    /// observation members; `Ok(None)` when the product has no record.
    fn observations(&self, seqnum: i32, members: &[usize]) -> Result<Option<Vec<Observation>>>;
}

/// How an observation member is read and scaled
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObservationMember {
    pub index: usize,
    pub factor: f64,
    pub offset: f64,
    /// Raw value marking a missing sample
    pub fill: Option<f64>,
}

impl ObservationMember {
    pub fn raw(index: usize) -> Self {
        Self {
            index,
            factor: 1.0,
            offset: 0.0,
            fill: None,
        }
    }

    pub fn scaled(index: usize, factor: f64, offset: f64) -> Self {
        Self {
            index,
            factor,
            offset,
            fill: None,
        }
    }

    /// Scaled value, `None` for fill values.
    pub fn apply(&self, raw: f64) -> Option<f64> {
        if raw.is_nan() || self.fill == Some(raw) {
            None
        } else {
            Some(raw * self.factor + self.offset)
        }
    }
}

/// Which observations of a grid point a value is derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationView {
    /// Least-squares value at the reference incidence angle
    Interpolated,
    /// Browse products: the single observation of the polarization
    Browse,
    /// The observation taken in one snapshot
    Snapshot(u32),
}


#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(f64);

    impl ValueAccessor<f64> for Fixed {
        fn get(&self, _seqnum: i32, _no_data: f64) -> f64 {
            self.0
        }
    }

    #[test]
    fn sample_conversion() {
        assert_eq!(i8::from_computed(12.6), Some(13));
        assert_eq!(i8::from_computed(300.0), None);
        assert_eq!(i16::from_computed(f64::NAN), None);
        assert_eq!(f32::from_computed(1.5), Some(1.5f32));
        assert_eq!(i32::from_computed(-2.5), Some(-3));
    }

    #[test]
    fn as_sample_falls_back_to_no_data() {
        let nan = AsSample(Fixed(f64::NAN));
        assert_eq!(ValueAccessor::<f32>::get(&nan, 1, -999.0), -999.0);
        let big = AsSample(Fixed(1e6));
        assert_eq!(ValueAccessor::<i16>::get(&big, 1, -1), -1);
        assert_eq!(ValueAccessor::<i32>::get(&big, 1, -1), 1_000_000);
        let shared: Arc<dyn ValueAccessor<f64>> = Arc::new(Fixed(2.0));
        assert_eq!(shared.get(5, 0.0), 2.0);
    }

    #[test]
    fn member_fill_and_scaling() {
        let m = ObservationMember {
            index: 0,
            factor: 0.5,
            offset: 1.0,
            fill: Some(-1.0),
        };
        assert_eq!(m.apply(4.0), Some(3.0));
        assert_eq!(m.apply(-1.0), None);
        assert_eq!(m.apply(f64::NAN), None);
    }
}
