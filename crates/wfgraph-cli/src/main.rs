//! wfgraph CLI
//!
//! - `download`: fetch the manifest index and every manifest into the data dir
//! - `ingest`: validate local manifests and write them into the graph
//! - `run`: `download` then `ingest`
//! - `check`: verify the Neo4j connection
//! - `summary`: node and edge counts of the configured store

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::EnvFilter;
use wfgraph_ingest::{IngestOptions, PipelineConfig};
use wfgraph_store::{GraphStore, MemoryGraph, Neo4jStore};

mod report;

#[derive(Parser)]
#[command(name = "wfgraph")]
#[command(
    author,
    version,
    about = "Load the public game-data export into a property graph"
)]
struct Cli {
    /// JSON config file; environment variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace). Overrides RUST_LOG.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only warnings and errors. Overrides RUST_LOG.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the manifest index and download every manifest it lists.
    Download {
        /// Export language code (default from config, `en`).
        #[arg(long)]
        lang: Option<String>,
    },

    /// Validate local manifests and materialize them into the graph.
    Ingest(IngestArgs),

    /// Download, then ingest.
    Run(IngestArgs),

    /// Verify the Neo4j connection and print server components.
    Check,

    /// Print node counts by label and edge counts by type.
    Summary(StoreArgs),
}

#[derive(Args)]
struct IngestArgs {
    #[command(flatten)]
    store: StoreArgs,

    /// Export language code (default from config, `en`).
    #[arg(long)]
    lang: Option<String>,

    /// Delete all existing nodes and edges first (asks for confirmation).
    #[arg(long)]
    clear: bool,

    /// Skip the confirmation prompt for `--clear`.
    #[arg(short, long, requires = "clear")]
    yes: bool,
}

#[derive(Args)]
struct StoreArgs {
    /// Graph store to write to.
    #[arg(long, value_enum, default_value_t = StoreKind::Neo4j)]
    store: StoreKind,

    /// With `--store memory`: load the graph from this JSON file if it
    /// exists and write it back afterwards.
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StoreKind {
    Neo4j,
    Memory,
}

// ============================================================================
// Store session
// ============================================================================

/// The store opened for one command; dropped when the command finishes.
enum Session {
    Neo4j(Neo4jStore),
    Memory {
        graph: MemoryGraph,
        snapshot: Option<PathBuf>,
    },
}

impl Session {
    async fn open(args: &StoreArgs, config: &PipelineConfig) -> Result<Self> {
        match args.store {
            StoreKind::Neo4j => {
                if args.snapshot.is_some() {
                    anyhow::bail!("--snapshot only applies to --store memory");
                }
                let store = Neo4jStore::connect(&config.neo4j)
                    .await
                    .context("opening Neo4j session")?;
                Ok(Session::Neo4j(store))
            }
            StoreKind::Memory => {
                let graph = match &args.snapshot {
                    Some(path) if path.exists() => MemoryGraph::load_snapshot(path)
                        .with_context(|| format!("loading snapshot {}", path.display()))?,
                    _ => MemoryGraph::new(),
                };
                Ok(Session::Memory {
                    graph,
                    snapshot: args.snapshot.clone(),
                })
            }
        }
    }

    fn store(&self) -> &dyn GraphStore {
        match self {
            Session::Neo4j(store) => store,
            Session::Memory { graph, .. } => graph,
        }
    }

    async fn prepare_writes(&self) {
        if let Session::Neo4j(store) = self {
            store.ensure_constraints().await;
        }
    }

    fn close(self) -> Result<()> {
        if let Session::Memory {
            graph,
            snapshot: Some(path),
        } = self
        {
            graph
                .save_snapshot(&path)
                .with_context(|| format!("writing snapshot {}", path.display()))?;
            eprintln!("{} {}", "wrote".green().bold(), path.display().to_string().bold());
        }
        Ok(())
    }
}

// ============================================================================
// Entry
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let mut config = PipelineConfig::load(cli.config.as_deref()).context("loading configuration")?;
    tracing::debug!(
        language = %config.language,
        data_dir = %config.data_dir.display(),
        neo4j = %config.neo4j.uri,
        "configuration loaded"
    );

    match cli.command {
        Commands::Download { lang } => {
            apply_lang(&mut config, lang)?;
            cmd_download(&config).await
        }
        Commands::Ingest(args) => {
            apply_lang(&mut config, args.lang.clone())?;
            cmd_ingest(&config, &args, false).await
        }
        Commands::Run(args) => {
            apply_lang(&mut config, args.lang.clone())?;
            cmd_ingest(&config, &args, true).await
        }
        Commands::Check => cmd_check(&config).await,
        Commands::Summary(args) => cmd_summary(&config, &args).await,
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = match (quiet, verbose) {
        (true, _) => EnvFilter::new("warn"),
        (false, 0) => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        (false, 1) => EnvFilter::new("debug"),
        (false, _) => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn apply_lang(config: &mut PipelineConfig, lang: Option<String>) -> Result<()> {
    if let Some(lang) = lang {
        config.language = lang;
        config.validate().context("invalid --lang")?;
    }
    Ok(())
}

/// Ask on the terminal before deleting the graph.
fn confirm_clear() -> bool {
    eprint!(
        "{} Clear all existing data? (yes/no): ",
        "warning:".yellow().bold()
    );
    io::stderr().flush().ok();

    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    let confirmed = answer.trim().eq_ignore_ascii_case("yes");
    if !confirmed {
        eprintln!("{}", "Skipping clear.".yellow());
    }
    confirmed
}

// ============================================================================
// Commands
// ============================================================================

async fn cmd_download(config: &PipelineConfig) -> Result<()> {
    eprintln!(
        "{} index `{}` into {}",
        "Downloading".green().bold(),
        config.language,
        config.data_dir.display()
    );
    let outcome = wfgraph_ingest::download(config)
        .await
        .context("download failed")?;
    report::print_download(&outcome);
    Ok(())
}

/// A memory snapshot is written even when the run fails part way.
async fn cmd_ingest(config: &PipelineConfig, args: &IngestArgs, download_first: bool) -> Result<()> {
    let session = Session::open(&args.store, config).await?;
    let outcome = ingest_into(&session, config, args, download_first).await;
    let closed = session.close();
    outcome?;
    closed
}

async fn ingest_into(
    session: &Session,
    config: &PipelineConfig,
    args: &IngestArgs,
    download_first: bool,
) -> Result<()> {
    session.prepare_writes().await;

    let options = IngestOptions {
        clear_first: args.clear,
    };
    let skip_prompt = args.yes;
    let confirm = move || skip_prompt || confirm_clear();

    if download_first {
        eprintln!(
            "{} `{}` export into {}",
            "Running".green().bold(),
            config.language,
            config.data_dir.display()
        );
        let run = wfgraph_ingest::run(session.store(), config, options, confirm)
            .await
            .context("run failed")?;
        report::print_download(&run.download);
        report::print_ingest(&run.ingest);
    } else {
        eprintln!(
            "{} {}",
            "Ingesting".green().bold(),
            config.data_dir.display()
        );
        let ingest = wfgraph_ingest::ingest(session.store(), config, options, confirm)
            .await
            .context("ingest failed")?;
        report::print_ingest(&ingest);
    }
    Ok(())
}

async fn cmd_check(config: &PipelineConfig) -> Result<()> {
    eprintln!("{} {}", "Connecting to".green().bold(), config.neo4j.uri);
    let store = Neo4jStore::connect(&config.neo4j)
        .await
        .context("connection check failed")?;
    let message = store.ping().await?;
    println!("{} {} ({})", "ok".green().bold(), message, store.uri());

    let components = store
        .components()
        .await
        .context("listing server components")?;
    report::print_components(&components);
    Ok(())
}

async fn cmd_summary(config: &PipelineConfig, args: &StoreArgs) -> Result<()> {
    let session = Session::open(args, config).await?;
    let summary = session
        .store()
        .summary()
        .await
        .context("summary query failed")?;
    report::print_summary(&summary);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn yes_requires_clear() {
        assert!(Cli::try_parse_from(["wfgraph", "ingest", "--yes"]).is_err());
        let cli = Cli::try_parse_from(["wfgraph", "ingest", "--clear", "--yes", "--store", "memory"]).unwrap();
        let Commands::Ingest(args) = cli.command else {
            panic!("expected ingest");
        };
        assert!(args.clear && args.yes);
        assert!(args.store.store == StoreKind::Memory);
    }

    #[tokio::test]
    async fn failed_run_still_writes_the_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = dir.path().join("graph.json");
        let closed = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();

        let mut config = PipelineConfig {
            data_dir: dir.path().join("data_raw"),
            ..PipelineConfig::default()
        };
        config.fetch.index_base_url = format!("http://{closed}/PublicExport");
        config.fetch.timeout_secs = 5;

        let cli = Cli::try_parse_from([
            "wfgraph",
            "run",
            "--store",
            "memory",
            "--snapshot",
            snapshot.to_str().unwrap(),
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };

        assert!(cmd_ingest(&config, &args, true).await.is_err());
        let graph = MemoryGraph::load_snapshot(&snapshot).unwrap();
        assert_eq!(graph.summary().await.unwrap().node_count("Resource"), 0);
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from(["wfgraph", "summary", "-vv", "--config", "wf.json"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("wf.json")));
        assert!(matches!(cli.command, Commands::Summary(_)));
    }
}
