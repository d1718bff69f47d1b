use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use covmap::aggregate::LinePolicy;
use covmap::cli;
use covmap::error::CovmapError;

/// Per-test source coverage maps from instrumentation probe hits.
#[derive(Parser)]
#[command(name = "covmap", version, about)]
struct Cli {
    /// Project root holding the .covmap directory.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover files, reset hit logs and run the external instrumenter.
    Instrument {
        /// Provider settings id.
        settings_id: String,
    },

    /// Aggregate hit logs against the probe map into the coverage state.
    Collect {
        /// Provider settings id.
        settings_id: String,

        /// Override the provider's line policy.
        #[arg(long, value_enum)]
        line_policy: Option<LinePolicy>,

        /// Root to join relative probe-map paths against.
        #[arg(long)]
        path_root: Option<String>,
    },

    /// List tests in the collected coverage state.
    Tests {
        /// Provider settings id.
        settings_id: String,
    },

    /// List the files a test touched.
    Files {
        /// Provider settings id.
        settings_id: String,

        /// Test identity, e.g. Namespace.FooTests.TestBar.
        test: String,
    },

    /// Show the lines of a file a test covered.
    Lines {
        /// Provider settings id.
        settings_id: String,

        /// Test identity.
        test: String,

        /// Source file path as stored in the coverage state.
        source_file: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match run(&cli) {
        Ok(output) => {
            print!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => match err.downcast_ref::<CovmapError>() {
            Some(e) if e.is_validation() => {
                eprintln!("{e}");
                ExitCode::from(2)
            }
            _ => {
                eprintln!("Error: {err:#}");
                ExitCode::FAILURE
            }
        },
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(cli: &Cli) -> Result<String> {
    let root = resolve_root(&cli.root)?;

    match &cli.command {
        Commands::Instrument { settings_id } => cli::cmd_instrument(&root, settings_id),
        Commands::Collect {
            settings_id,
            line_policy,
            path_root,
        } => cli::cmd_collect(&root, settings_id, *line_policy, path_root.as_deref()),
        Commands::Tests { settings_id } => {
            let state = cli::load_state(&root, settings_id)?;
            cli::cmd_tests(&state)
        }
        Commands::Files { settings_id, test } => {
            let state = cli::load_state(&root, settings_id)?;
            cli::cmd_files(&state, test)
        }
        Commands::Lines {
            settings_id,
            test,
            source_file,
        } => {
            let state = cli::load_state(&root, settings_id)?;
            cli::cmd_lines(&state, test, source_file)
        }
    }
}

/// The instrumenter runs in the provider's working directory, so every path
/// handed to it must be absolute.
fn resolve_root(root: &Path) -> Result<PathBuf> {
    root.canonicalize()
        .with_context(|| format!("Project root {} is not accessible", root.display()))
}
