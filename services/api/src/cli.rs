use crate::export::{run_export, ExportArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use valuation_render::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Valuation Render",
    about = "Serve valuation package views and export them to PDF",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Print one package view to a PDF file through the rendering application
    Export(ExportArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Export(args) => run_export(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["valuation-render-api"]).expect("parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn export_requires_id_and_output() {
        let cli = Cli::try_parse_from([
            "valuation-render-api",
            "export",
            "--id",
            "42",
            "--output",
            "report.pdf",
        ])
        .expect("parses");
        match cli.command {
            Some(Command::Export(args)) => {
                assert_eq!(args.id, "42");
                assert_eq!(args.output.to_str(), Some("report.pdf"));
            }
            other => panic!("unexpected command {other:?}"),
        }

        assert!(Cli::try_parse_from(["valuation-render-api", "export", "--id", "42"]).is_err());
    }
}
