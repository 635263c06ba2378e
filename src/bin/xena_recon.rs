use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use xena_recon::app::App;
use xena_recon::config::{ConfigLoader, expand_data_types};
use xena_recon::domain::{DataType, ProjectId};
use xena_recon::error::ReconError;
use xena_recon::fetch::GdcFileFetcher;
use xena_recon::gdc::GdcHttpClient;
use xena_recon::output::{JsonOutput, OutputMode, print_text_summary};
use xena_recon::store::Store;

#[derive(Parser)]
#[command(name = "xena-recon")]
#[command(about = "Reconcile published Xena matrices against authoritative GDC records")]
#[command(version, author)]
struct Cli {
    /// Project ids to check (e.g. TARGET-AML).
    #[arg(short, long, num_args = 1..)]
    projects: Vec<String>,

    /// Data types to check; `STAR` expands to the four expression flavors.
    /// Defaults to every supported data type.
    #[arg(short = 't', long = "datatype", num_args = 1..)]
    data_types: Vec<String>,

    /// Directory holding `<project>/Xena_Matrices/` trees. Defaults to the
    /// parent directory.
    #[arg(long)]
    matrix_dir: Option<String>,

    /// Working directory for raw files and scratch output. Defaults to the
    /// current directory.
    #[arg(long)]
    work_dir: Option<String>,

    /// Read projects/data types from a config file instead of flags.
    #[arg(long)]
    config: Option<String>,

    /// Emit the run summary as JSON instead of text.
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(recon) = report.downcast_ref::<ReconError>() {
            return ExitCode::from(map_exit_code(recon));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &ReconError) -> u8 {
    match error {
        ReconError::MissingConfig
        | ReconError::ConfigRead(_)
        | ReconError::ConfigParse(_)
        | ReconError::InvalidProject(_)
        | ReconError::UnsupportedDataType(_) => 2,
        ReconError::GdcHttp(_)
        | ReconError::GdcStatus { .. }
        | ReconError::FetchHttp(_)
        | ReconError::FetchStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };

    let config = if cli.config.is_some() || cli.projects.is_empty() {
        Some(ConfigLoader::resolve(cli.config.as_deref()).into_diagnostic()?)
    } else {
        None
    };

    let projects: Vec<ProjectId> = if cli.projects.is_empty() {
        config
            .as_ref()
            .map(|config| config.projects.clone())
            .unwrap_or_default()
    } else {
        cli.projects
            .iter()
            .map(|value| value.parse())
            .collect::<Result<_, _>>()
            .into_diagnostic()?
    };
    if projects.is_empty() {
        return Err(miette::Report::msg(
            "no projects given (use --projects or a config file)",
        ));
    }

    let data_types: Vec<DataType> = if cli.data_types.is_empty() {
        match config.as_ref().filter(|config| !config.data_types.is_empty()) {
            Some(config) => config.data_types.clone(),
            None => DataType::ALL.to_vec(),
        }
    } else {
        expand_data_types(&cli.data_types).into_diagnostic()?
    };

    let matrix_dir = cli
        .matrix_dir
        .map(Utf8PathBuf::from)
        .or_else(|| config.as_ref().and_then(|config| config.matrix_dir.clone()))
        .unwrap_or_else(|| Utf8PathBuf::from(".."));
    let work_dir = cli
        .work_dir
        .map(Utf8PathBuf::from)
        .or_else(|| config.as_ref().and_then(|config| config.work_dir.clone()));

    let store = match work_dir {
        Some(work_dir) => Store::new_with_paths(work_dir, matrix_dir),
        None => Store::new(matrix_dir).into_diagnostic()?,
    };

    let gdc = GdcHttpClient::new().into_diagnostic()?;
    let fetcher = GdcFileFetcher::new().into_diagnostic()?;
    let app = App::new(store, gdc, fetcher);

    let summary = app.run(&projects, &data_types);
    match output_mode {
        OutputMode::Json => JsonOutput::print_summary(&summary).into_diagnostic()?,
        OutputMode::Text => print_text_summary(&summary),
    }

    if summary.all_passed() {
        Ok(())
    } else {
        Err(miette::Report::msg("one or more checks did not pass"))
    }
}
