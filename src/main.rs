//! Command-line interface for the grafonnet-scaffold binary.
//!
//! The CLI loads a Grafana dashboard export, generates the Grafonnet scaffold
//! and writes it below the requested output directory.

use std::{io, path::PathBuf, process};

use clap::{ArgAction, Parser};
use grafonnet_scaffold::{
    DEFAULT_DATASOURCE_TYPE, Error, GeneratorConfig, ScaffoldOptions, ScaffoldReport, generate,
    load_config, load_dashboard
};
use tracing_subscriber::EnvFilter;

/// Command line interface for converting dashboard exports.
#[derive(Debug, Parser)]
#[command(
    name = "grafonnet-scaffold",
    version,
    about = "Convert a Grafana dashboard export into a Grafonnet scaffold"
)]
struct Cli {
    /// Path to the Grafana dashboard export (JSON).
    #[arg(long = "input", value_name = "PATH")]
    input: PathBuf,

    /// Directory receiving `<slug>.jsonnet` and the `lib/` files.
    #[arg(long = "output-dir", value_name = "DIR")]
    output_dir: PathBuf,

    /// System the dashboard belongs to, e.g. `application`.
    #[arg(long = "system", value_name = "NAME")]
    system: String,

    /// Datasource type for panels that do not declare one.
    #[arg(
        long = "datasource-type",
        value_name = "TYPE",
        env = "GRAFONNET_DATASOURCE_TYPE",
        default_value = DEFAULT_DATASOURCE_TYPE
    )]
    datasource_type: String,

    /// Datasource uid, overriding the export's `__inputs`.
    #[arg(long = "datasource-uid", value_name = "UID")]
    datasource_uid: Option<String>,

    /// Slug for the generated file names, overriding the title-derived one.
    #[arg(long = "slug", value_name = "SLUG")]
    slug: Option<String>,

    /// YAML generator configuration.
    #[arg(long = "config", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Additional datasource type that forces panels to raw fallback.
    #[arg(long = "blocked-datasource", value_name = "TYPE")]
    blocked_datasources: Vec<String>,

    /// Print a JSON run summary to stdout.
    #[arg(long = "report", action = ArgAction::SetTrue)]
    report: bool
}

/// Entry point that reports errors and sets the appropriate exit status.
fn main() {
    init_tracing();

    if let Err(error) = run(Cli::parse()) {
        eprintln!("{}", error.to_display_string());
        process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

/// Executes the CLI using parsed arguments.
///
/// # Errors
///
/// Propagates errors from configuration loading, dashboard parsing and
/// writing the scaffold.
fn run(cli: Cli) -> Result<(), Error> {
    let config = match cli.config.as_deref() {
        Some(path) => load_config(path)?,
        None => GeneratorConfig::default()
    };
    let options = build_options(&cli, &config);

    let dashboard = load_dashboard(&cli.input)?;
    let report = generate(&dashboard, &options)?.write(&cli.output_dir)?;

    if cli.report {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        write_report(&mut handle, &report)?;
    }

    Ok(())
}

fn build_options(cli: &Cli, config: &GeneratorConfig) -> ScaffoldOptions {
    let mut options = ScaffoldOptions::from_config(cli.system.clone(), config);
    options.datasource_type = cli.datasource_type.clone();
    options.datasource_uid = cli.datasource_uid.clone();
    options.slug = cli.slug.clone();
    options.denylist.extend(&cli.blocked_datasources);
    options
}

fn write_report<W: io::Write>(writer: &mut W, report: &ScaffoldReport) -> Result<(), Error> {
    serde_json::to_writer_pretty(writer, report)?;
    Ok(())
}
