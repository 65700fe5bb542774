//! # arXiv harvester CLI (`harvest`)
//!
//! ## Usage
//!
//! ```bash
//! harvest --config ./config/harvest.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `harvest init` | Create the target index if it is missing |
//! | `harvest ping` | Print the cluster version |
//! | `harvest indices` | List non-system indices |
//! | `harvest delete-index <name>` | Delete an index |
//! | `harvest sync --from D --until D` | Harvest one date range |
//! | `harvest sync --start YM --end YM` | Backfill month by month |
//!
//! ## Examples
//!
//! ```bash
//! # Single range, computer science only
//! harvest sync --from 2026-01-01 --until 2026-01-31 --cs-only
//!
//! # Resumable backfill that keeps going past failed months
//! harvest sync --start 2020-01 --end 2025-12 --resume --continue-on-error
//!
//! # Load into a semantic index (abstract embedded by the cluster)
//! ES_INDEX=arxiv-papers-2026-semantic harvest init
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgGroup, Parser, Subcommand};

use arxiv_harvest::config::{self, IndexSchema};
use arxiv_harvest::ingest::{SyncMode, SyncOptions};
use arxiv_harvest::progress::ProgressMode;
use arxiv_harvest::{indices, ingest, logging};

const DEFAULT_CONFIG: &str = "./config/harvest.toml";

/// arXiv OAI-PMH harvester for Elasticsearch.
///
/// All commands accept `--config`. A missing file at the default path is
/// fine: defaults plus `ELASTICSEARCH_*` / `ES_INDEX` from the environment
/// (or `.env`) are used.
#[derive(Parser)]
#[command(
    name = "harvest",
    about = "Harvest arXiv metadata over OAI-PMH into Elasticsearch",
    version
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the target index if it does not exist.
    Init {
        /// Mapping to use; defaults to the configured schema or the index name.
        #[arg(long)]
        schema: Option<IndexSchema>,

        /// Index name (overrides config and ES_INDEX).
        #[arg(long)]
        index: Option<String>,
    },

    /// Check connectivity and print the cluster version.
    Ping,

    /// List indices, hiding system indices.
    Indices,

    /// Delete an index.
    DeleteIndex { name: String },

    /// Harvest a date range or backfill a span of months.
    #[command(group(
        ArgGroup::new("range")
            .args(["from", "start"])
            .required(true)
    ))]
    Sync {
        /// First day of a single range (YYYY-MM-DD).
        #[arg(long, requires = "until", conflicts_with_all = ["start", "end"])]
        from: Option<String>,

        /// Last day of a single range (YYYY-MM-DD); clamped to today.
        #[arg(long, requires = "from")]
        until: Option<String>,

        /// First month of a backfill (YYYY-MM).
        #[arg(long, requires = "end")]
        start: Option<String>,

        /// Last month of a backfill (YYYY-MM).
        #[arg(long, requires = "start")]
        end: Option<String>,

        /// Only papers with at least one `cs.` category.
        #[arg(long)]
        cs_only: bool,

        /// Category prefix filter; repeatable. Replaces the configured list.
        #[arg(long = "category", value_name = "PREFIX")]
        categories: Vec<String>,

        /// Index name (overrides config and ES_INDEX).
        #[arg(long)]
        index: Option<String>,

        /// Suppress progress output.
        #[arg(long, short = 'q')]
        quiet: bool,

        /// Progress format on stderr.
        #[arg(long, value_enum, default_value = "human")]
        progress: ProgressMode,

        /// Log failed months and keep going instead of aborting (backfill only).
        #[arg(long, requires = "start")]
        continue_on_error: bool,

        /// Skip months recorded in the checkpoint file (backfill only).
        #[arg(long, requires = "start")]
        resume: bool,

        /// Print the planned windows without contacting any server.
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let (path, required) = match &cli.config {
        Some(p) => (p.clone(), true),
        None => (PathBuf::from(DEFAULT_CONFIG), false),
    };
    let cfg = config::load_config(&path, required)
        .with_context(|| format!("configuration error ({})", path.display()))?;
    logging::init_logging(&cfg.logging)?;

    match cli.command {
        Commands::Init { schema, index } => {
            indices::run_init(&cfg, index.as_deref(), schema).await?;
        }
        Commands::Ping => {
            indices::run_ping(&cfg).await?;
        }
        Commands::Indices => {
            indices::run_list(&cfg).await?;
        }
        Commands::DeleteIndex { name } => {
            indices::run_delete(&cfg, &name).await?;
        }
        Commands::Sync {
            from,
            until,
            start,
            end,
            cs_only,
            categories,
            index,
            quiet,
            progress,
            continue_on_error,
            resume,
            dry_run,
        } => {
            let mode = match (from, until, start, end) {
                (Some(from), Some(until), None, None) => SyncMode::Range { from, until },
                (None, None, Some(start), Some(end)) => SyncMode::Backfill { start, end },
                _ => anyhow::bail!("use either --from/--until or --start/--end"),
            };
            let opts = SyncOptions {
                mode,
                categories,
                cs_only,
                index,
                progress: if quiet { ProgressMode::Off } else { progress },
                continue_on_error,
                resume,
                dry_run,
            };
            let today = chrono::Utc::now().date_naive();
            ingest::run_sync(&cfg, &opts, today).await?;
        }
    }

    Ok(())
}
