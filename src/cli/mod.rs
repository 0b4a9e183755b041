//! Command Line Interface (CLI) layer of the smospro export tool.
//!
//! This module defines argument parsing (`args`), error types (`errors`),
//! and the orchestration logic (`runner`) of the batch export. It wires
//! user-provided options to the library functionality exposed via
//! `smospro::api`.
//!
//! If you are embedding smospro into another application, prefer using
//! the high-level `smospro::api` module instead of calling the CLI code.
pub mod args;
pub mod errors;
pub mod runner;

pub use args::{CliArgs, normalize_args};
pub use runner::run;
