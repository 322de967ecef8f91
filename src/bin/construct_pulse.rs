use std::fs;
use std::process::ExitCode;

use chrono::Local;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use construct_pulse::app::App;
use construct_pulse::config::{ConfigLoader, ResolvedConfig};
use construct_pulse::domain::{ConstructId, Month};
use construct_pulse::error::PulseError;
use construct_pulse::platforms::maven::export_start_month;
use construct_pulse::platforms::{
    GoModClient, MavenStatsClient, NpmClient, NugetClient, PlatformClient, PypiClient,
};
use construct_pulse::report::{group_thousands, markdown_table};
use construct_pulse::series::{IngestBatch, SeriesStore, parse_export_csv};

#[derive(Parser)]
#[command(name = "construct-pulse")]
#[command(about = "Track package downloads for multi-language constructs across NPM, PyPI, Maven, NuGet and Go")]
#[command(version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Collect downloads for every tracked construct and print the summary table")]
    Report(ReportArgs),
    #[command(about = "Merge a Maven statistics CSV export into a construct's accumulated series")]
    Ingest(IngestArgs),
    #[command(about = "Print a construct's accumulated monthly series")]
    Check(CheckArgs),
}

#[derive(Args)]
struct ReportArgs {
    #[arg(long)]
    config: Option<String>,
}

#[derive(Args)]
struct IngestArgs {
    construct: String,

    #[arg(long)]
    config: Option<String>,

    /// Path of the CSV export; defaults to <csv dir>/<construct>.csv
    #[arg(long)]
    csv: Option<String>,

    /// Month of the export's first row (YYYY-MM); defaults to twelve
    /// months before today
    #[arg(long)]
    start_month: Option<String>,
}

#[derive(Args)]
struct CheckArgs {
    construct: String,

    #[arg(long)]
    config: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(pulse) = report.downcast_ref::<PulseError>() {
            return ExitCode::from(map_exit_code(pulse));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &PulseError) -> u8 {
    match error {
        PulseError::MissingConfig
        | PulseError::ConfigRead(_)
        | PulseError::ConfigParse(_)
        | PulseError::InvalidConstructId(_)
        | PulseError::InvalidMonth(_) => 2,
        PulseError::NpmHttp(_)
        | PulseError::NpmStatus { .. }
        | PulseError::PypiHttp(_)
        | PulseError::PypiStatus { .. }
        | PulseError::NugetHttp(_)
        | PulseError::NugetStatus { .. }
        | PulseError::GoDevHttp(_)
        | PulseError::GoDevStatus { .. }
        | PulseError::GitHubHttp(_)
        | PulseError::GitHubStatus { .. } => 3,
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
    match cli.command {
        Commands::Report(args) => run_report(args),
        Commands::Ingest(args) => run_ingest(args),
        Commands::Check(args) => run_check(args),
    }
}

fn load_config(path: Option<&str>) -> miette::Result<ResolvedConfig> {
    match ConfigLoader::resolve(path) {
        Ok(resolved) => Ok(resolved),
        Err(PulseError::MissingConfig) if path.is_none() => {
            ConfigLoader::default_run().into_diagnostic()
        }
        Err(err) => Err(err).into_diagnostic(),
    }
}

fn run_report(args: ReportArgs) -> miette::Result<()> {
    let config = load_config(args.config.as_deref())?;
    let store = SeriesStore::new(config.series_root.clone());
    let github_token = std::env::var("GITHUB_TOKEN")
        .ok()
        .filter(|token| !token.trim().is_empty());

    let clients: Vec<Box<dyn PlatformClient>> = vec![
        Box::new(NpmClient::new().into_diagnostic()?),
        Box::new(PypiClient::new().into_diagnostic()?),
        Box::new(MavenStatsClient::new(store, config.csv_dir.clone())),
        Box::new(NugetClient::new().into_diagnostic()?),
        Box::new(GoModClient::new(config.github_owner.clone(), github_token).into_diagnostic()?),
    ];

    let app = App::new(clients);
    let report = app.collect_all(&config.constructs);

    for totals in &report.constructs {
        println!(
            "There are {} downloads for {}, including 5 programming languages.",
            group_thousands(totals.total),
            totals.construct
        );
        for count in &totals.counts {
            println!(
                "\t{} downloads: {}",
                count.platform,
                group_thousands(count.downloads)
            );
        }
    }
    println!(
        "Total time taken for {} constructs: {:.2}s.",
        group_thousands(report.constructs.len() as u64),
        report.elapsed.as_secs_f64()
    );
    println!();
    print!("{}", markdown_table(&report));
    println!(
        "Total downloads for {} constructs are {}.",
        group_thousands(report.constructs.len() as u64),
        group_thousands(report.grand_total)
    );
    Ok(())
}

fn run_ingest(args: IngestArgs) -> miette::Result<()> {
    let config = load_config(args.config.as_deref())?;
    let construct: ConstructId = args.construct.parse().into_diagnostic()?;
    let store = SeriesStore::new(config.series_root.clone());

    let csv_path = match args.csv {
        Some(path) => camino::Utf8PathBuf::from(path),
        None => config.csv_dir.join(format!("{construct}.csv")),
    };
    let start_month: Month = match args.start_month {
        Some(label) => label.parse().into_diagnostic()?,
        None => export_start_month(Local::now().date_naive()),
    };

    let content = fs::read_to_string(csv_path.as_std_path())
        .map_err(|err| PulseError::Storage(format!("read export {csv_path}: {err}")))
        .into_diagnostic()?;
    let rows = parse_export_csv(&content).into_diagnostic()?;
    let batch = IngestBatch::from_rows(&rows, start_month);
    let series = store.ingest(&construct, &batch).into_diagnostic()?;

    match series.aggregate() {
        Some(aggregate) => println!(
            "{construct}: {} months accumulated, {} downloads since {}.",
            series.len(),
            group_thousands(aggregate.total_downloads),
            aggregate.earliest_month
        ),
        None => println!("{construct}: series is empty."),
    }
    Ok(())
}

fn run_check(args: CheckArgs) -> miette::Result<()> {
    let config = load_config(args.config.as_deref())?;
    let construct: ConstructId = args.construct.parse().into_diagnostic()?;
    let store = SeriesStore::new(config.series_root.clone());

    match store.load_existing(&construct).into_diagnostic()? {
        Some(series) if !series.is_empty() => {
            println!("month    downloads");
            for record in series.records() {
                println!("{}  {}", record.month, group_thousands(record.downloads));
            }
        }
        _ => println!("No accumulated series for {construct}."),
    }
    Ok(())
}
