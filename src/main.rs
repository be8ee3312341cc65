use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use storebench::cli::RunOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "storebench")]
#[command(about = "Insert and aggregation benchmark across PostgreSQL, MongoDB and DuckDB", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate reports, write them to every backend, then compare queries
    Run(RunArgs),
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Serve the report registration endpoint
    Serve,
}

#[derive(Args)]
struct RunArgs {
    #[arg(long)]
    total_reports: Option<u64>,

    #[arg(long)]
    batch_size: Option<usize>,

    #[arg(long)]
    max_concurrency: Option<usize>,

    /// Only run the comparison queries against existing data
    #[arg(long)]
    skip_insert: bool,

    /// Empty every backend before inserting
    #[arg(long)]
    clear: bool,
}

impl From<RunArgs> for RunOptions {
    fn from(args: RunArgs) -> Self {
        RunOptions {
            total_reports: args.total_reports,
            batch_size: args.batch_size,
            max_concurrency: args.max_concurrency,
            skip_insert: args.skip_insert,
            clear: args.clear,
        }
    }
}

#[derive(Subcommand)]
enum ConfigAction {
    Init {
        #[arg(long)]
        stdout: bool,

        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storebench=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run(args)) => {
            storebench::cli::run(cli.config, args.into()).await?;
        }
        None => {
            storebench::cli::run(cli.config, RunOptions::default()).await?;
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init { stdout, force } => {
                storebench::cli::config::init(stdout, force)?;
            }
            ConfigAction::Validate => {
                storebench::cli::config::validate(cli.config.as_deref())?;
            }
        },
        Some(Commands::Serve) => {
            storebench::cli::serve::serve(cli.config).await?;
        }
    }

    Ok(())
}
