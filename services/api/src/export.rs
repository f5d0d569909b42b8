use crate::infra::export_engine;
use clap::Args;
use std::path::PathBuf;
use tracing::info;
use valuation_render::config::AppConfig;
use valuation_render::error::AppError;
use valuation_render::telemetry;

#[derive(Args, Debug)]
pub(crate) struct ExportArgs {
    /// Package identifier the rendering application serves
    #[arg(long)]
    pub(crate) id: String,
    /// Destination file for the PDF bytes
    #[arg(long)]
    pub(crate) output: PathBuf,
}

pub(crate) async fn run_export(args: ExportArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let engine = export_engine(&config);
    let bytes = engine.export(&args.id).await?;
    tokio::fs::write(&args.output, &bytes).await?;

    info!(
        package_id = %args.id,
        output = %args.output.display(),
        bytes = bytes.len(),
        "pdf written"
    );
    println!("Wrote {} bytes to {}", bytes.len(), args.output.display());
    Ok(())
}
