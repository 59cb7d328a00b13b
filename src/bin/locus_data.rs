use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use locus_data::config::ConfigLoader;
use locus_data::control::FetchOptions;
use locus_data::domain::{GenomeBuild, Region, ViewState};
use locus_data::error::LocusError;
use locus_data::output::JsonOutput;
use locus_data::requester::Requester;
use locus_data::transport::{DEFAULT_TIMEOUT, HttpTransport};

#[derive(Parser)]
#[command(name = "locus-data")]
#[command(about = "Fetch and join association-plot data from configured sources")]
#[command(version, author)]
struct Cli {
    /// Sources file (defaults to locus-data.json in the current directory)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Fetch namespaced fields for a region and print the joined chain")]
    Fetch(FetchArgs),
    #[command(about = "Print the configured sources as [type, config] pairs")]
    Sources,
}

#[derive(Args)]
struct FetchArgs {
    /// Region as chr:start-end
    #[arg(long)]
    region: Region,

    /// Comma separated namespace:field specifiers, in dependency order
    #[arg(long, value_delimiter = ',', required = true)]
    fields: Vec<String>,

    #[arg(long)]
    build: Option<GenomeBuild>,

    #[arg(long)]
    ldrefvar: Option<String>,

    #[arg(long)]
    ld_source: Option<String>,

    #[arg(long)]
    ld_pop: Option<String>,

    /// Variant for variant-keyed sources such as PheWAS
    #[arg(long)]
    variant: Option<String>,

    /// Overall deadline for the whole request
    #[arg(long)]
    timeout_secs: Option<u64>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<LocusError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &LocusError) -> u8 {
    if error.is_configuration() {
        2
    } else if error.is_network() {
        3
    } else {
        1
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let sources = ConfigLoader::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Sources => JsonOutput::print_sources(&sources).into_diagnostic(),
        Commands::Fetch(args) => {
            let timeout = args.timeout_secs.map(Duration::from_secs);
            let transport = HttpTransport::with_timeout(
                timeout.map_or(DEFAULT_TIMEOUT, |limit| limit.min(DEFAULT_TIMEOUT)),
            )?;
            let state = ViewState {
                genome_build: args.build,
                ldrefvar: args.ldrefvar,
                ld_source: args.ld_source,
                ld_pop: args.ld_pop,
                variant: args.variant,
                ..ViewState::for_region(&args.region)
            };
            let options = FetchOptions {
                timeout,
                ..FetchOptions::default()
            };

            let requester = Requester::new(sources, transport);
            let chain = requester.get_data_with(&state, &args.fields, &options)?;
            JsonOutput::print_chain(&chain).into_diagnostic()
        }
    }
}
