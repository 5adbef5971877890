//! ndafetch CLI - package downloader
//!
//! Resolves a package manifest into signed URLs, downloads every file with
//! aria2c and keeps retrying until nothing is missing.

mod commands;
mod output;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use ndafetch_core::FetchConfig;
use std::path::PathBuf;

/// ndafetch - download a data package until every file is present
#[derive(Parser)]
#[command(name = "ndafetch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file
    #[arg(short, long, env = "NDAFETCH_CONFIG", default_value = "ndafetch.toml")]
    config: PathBuf,

    /// Package API username
    #[arg(long, env = "NDA_USERNAME")]
    username: Option<String>,

    /// Package API password
    #[arg(long, env = "NDA_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Output format
    #[arg(long, default_value = "human")]
    output: OutputFormat,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

/// Values that take precedence over the configuration file
#[derive(Args)]
struct Overrides {
    /// Manifest listing the package objects
    #[arg(long, global = true)]
    manifest: Option<PathBuf>,

    /// Package identifier
    #[arg(long, global = true)]
    package_id: Option<String>,

    /// Root directory for downloaded files
    #[arg(long, global = true)]
    download_dir: Option<PathBuf>,

    /// Extra options passed to the transfer tool, e.g. "-x 4 --continue=true"
    #[arg(long, global = true, allow_hyphen_values = true)]
    transfer_options: Option<String>,

    /// Package API base URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Seconds to wait before retrying a batch with failures
    #[arg(long, global = true)]
    retry_interval: Option<u64>,

    /// Give up after this many iterations
    #[arg(long, global = true)]
    max_iterations: Option<u32>,

    /// Transfer program to run
    #[arg(long, global = true)]
    transfer_program: Option<String>,

    /// Append-only download history
    #[arg(long, global = true)]
    history_log: Option<PathBuf>,
}

impl Overrides {
    fn apply(self, config: &mut FetchConfig) {
        if let Some(manifest) = self.manifest {
            config.manifest_file = Some(manifest);
        }
        if let Some(package_id) = self.package_id {
            config.package_id = Some(package_id);
        }
        if let Some(dir) = self.download_dir {
            config.download_directory = Some(dir);
        }
        if let Some(options) = self.transfer_options {
            config.transfer_options = options;
        }
        if let Some(url) = self.api_url {
            config.api_base_url = url;
        }
        if let Some(secs) = self.retry_interval {
            config.retry_interval_secs = secs;
        }
        if let Some(max) = self.max_iterations {
            config.max_iterations = Some(max);
        }
        if let Some(program) = self.transfer_program {
            config.transfer_program = program;
        }
        if let Some(log) = self.history_log {
            config.history_log = log;
        }
    }
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum OutputFormat {
    Human,
    Json,
    Table,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the package, retrying until every file is present
    Run,

    /// Authenticate and resolve the manifest once without downloading
    Resolve,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "debug,reqwest=info,hyper=info"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        use clap::CommandFactory;
        clap_complete::generate(shell, &mut Cli::command(), "ndafetch", &mut std::io::stdout());
        return Ok(());
    }

    init_logging(cli.verbose);

    let mut config = FetchConfig::load_or_default(&cli.config)?;
    cli.overrides.apply(&mut config);
    let credentials = commands::Credentials {
        username: cli.username,
        password: cli.password,
    };

    match cli.command {
        Commands::Run => commands::run(config, credentials, cli.output).await?,
        Commands::Resolve => commands::resolve(config, credentials, cli.output).await?,
        Commands::Completions { .. } => unreachable!("handled above"),
    }

    Ok(())
}
