use clap::CommandFactory;
use clap::error::ErrorKind;
use tracing::info;
use tracing_subscriber::EnvFilter;

use smospro::api::{ExportTarget, run_export_batch};
use smospro::core::params::ExportParams;
use smospro::types::CancelFlag;

use super::args::CliArgs;
use super::errors::AppError;

/// Install the fmt subscriber; `RUST_LOG` overrides the default level.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn export_params(args: &CliArgs) -> Result<ExportParams, AppError> {
    let mut params = match &args.config {
        Some(path) => ExportParams::from_json_file(path)?,
        None => ExportParams::default(),
    };
    if args.schema_dir.is_some() {
        params.schema_dir = args.schema_dir.clone();
    }
    if args.descriptor_dir.is_some() {
        params.descriptor_dir = args.descriptor_dir.clone();
    }
    Ok(params)
}

pub fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.log {
        init_logging();
    }

    let filter = match args.filter() {
        Ok(filter) => filter,
        Err(e) => CliArgs::command().error(ErrorKind::ValueValidation, e).exit(),
    };
    let params = export_params(&args)?;
    let target = ExportTarget::from_output(args.output.as_deref());
    info!("Region of interest: {:?}", filter);
    info!("Output: {:?}", target);

    let cancel = CancelFlag::new();
    let report = match run_export_batch(&args.sources, &filter, &target, &params, &cancel) {
        Ok(report) => report,
        Err(smospro::Error::Cancelled) => return Err(AppError::Cancelled.into()),
        Err(e) => return Err(AppError::from(e).into()),
    };

    info!("Batch export complete!");
    info!("Processed: {}", report.processed);
    info!("Skipped: {}", report.skipped);
    info!("Errors: {}", report.errors);
    Ok(())
}
