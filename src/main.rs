//! smospro CLI entrypoint.
//!
//! Provides a thin wrapper over the `cli` module: parse args, run the batch
//! export, and exit with appropriate status.
//! For programmatic use, prefer the library API (`smospro::api`).

use clap::Parser;

mod cli;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = cli::CliArgs::parse_from(cli::normalize_args(std::env::args_os()));
    cli::run(args)
}
