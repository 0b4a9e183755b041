//! Core building blocks: the discrete global grid and its index, lazily
//! built file aggregates, value accessors with derived computations and the
//! tile materialization engine. These are consumed by the high-level `api`
//! module.
pub mod grid;
pub mod lazy;
pub mod params;
pub mod snapshot;
pub mod tile;
pub mod value;
