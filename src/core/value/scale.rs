use super::ValueAccessor;

/// `value * factor + offset` decorator; missing values stay missing.
#[derive(Debug, Clone)]
pub struct Scaled<A> {
    inner: A,
    factor: f64,
    offset: f64,
}

impl<A: ValueAccessor<f64>> Scaled<A> {
    pub fn new(inner: A, factor: f64, offset: f64) -> Self {
        Self { inner, factor, offset }
    }
}

impl<A: ValueAccessor<f64>> ValueAccessor<f64> for Scaled<A> {
    fn get(&self, seqnum: i32, no_data: f64) -> f64 {
        let v = self.inner.get(seqnum, f64::NAN);
        if v.is_nan() {
            no_data
        } else {
            v * self.factor + self.offset
        }
    }
}
