//! # Dossier CLI Module
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `status` - Show record and edge counts
//! - `init` - Initialize a new store
//! - `ingest` - Load base records from a JSON file
//! - `recompute` - Recompute derived edges and print the report
//! - `validate` - Validate the stored edges
//! - `edges` - List stored edges of one kind
//! - `timeline` - Show a victim's case timeline
//! - `chain` - Walk a correspondence chain
//! - `export` - Export computed edges
//! - `import` - Import computed edges from a canonical export
//! - `hash` - Print the BLAKE3 fingerprint of the computed edges

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use dossier::config::AppConfig;
use dossier_core::DossierError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Dossier - derived relationships for archival knowledge graphs
///
/// Computes reply pairs, correspondence chains, context links and case
/// sequences from the temporal and referential structure of the records.
#[derive(Parser, Debug)]
#[command(name = "dossier")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the store
    #[arg(short = 'D', long, global = true, default_value = "dossier.redb")]
    pub database: PathBuf,

    /// Storage backend
    #[arg(short = 'B', long, global = true, value_enum, default_value_t = Backend::Redb)]
    pub backend: Backend,

    /// Configuration file (default: ./dossier.toml when present)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Storage backends selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// ACID redb database
    Redb,
    /// Whole-graph file, rewritten on every change
    File,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Redb => "redb",
            Self::File => "file",
        }
    }
}

/// Export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    /// Canonical postcard bytes with BLAKE3 header
    Canonical,
    /// Flat JSON edge list
    Json,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to (overrides the config file)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show record and edge counts
    Status,

    /// Initialize a new empty store
    Init {
        /// Force initialization even if the store exists
        #[arg(short, long)]
        force: bool,
    },

    /// Load communications and events from a JSON file
    Ingest {
        /// Path to the input file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Recompute derived edges
    Recompute {
        /// Chain window in days (overrides the config file)
        #[arg(short, long)]
        window: Option<u32>,

        /// Comma-separated edge kinds to recompute (reply, chain, context, case_sequence)
        #[arg(short, long)]
        kinds: Option<String>,

        /// Compute and report without writing any edge
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate the stored edges
    Validate,

    /// List stored edges of one kind
    Edges {
        /// Edge kind (reply, chain, context, case_sequence)
        kind: String,

        /// Maximum number of edges to print
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// Show a victim's case timeline
    Timeline {
        /// Victim entity reference
        victim: String,
    },

    /// Walk a correspondence chain from a communication
    Chain {
        /// Starting communication id
        start: String,

        /// Traversal depth
        #[arg(short, long, default_value = "10")]
        depth: usize,
    },

    /// Export computed edges
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Export format
        #[arg(short = 't', long, value_enum, default_value_t = ExportFormat::Canonical)]
        format: ExportFormat,
    },

    /// Import computed edges from a canonical export
    Import {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Print the BLAKE3 fingerprint of the computed edges
    Hash,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), DossierError> {
    let config = AppConfig::load(cli.config.as_deref())?;
    config.validate()?;

    let ctx = Context {
        database: cli.database,
        backend: cli.backend,
        json_mode: cli.json_mode,
        verbose: cli.verbose,
    };

    match cli.command {
        Some(Commands::Server { host, port }) => cmd_server(&ctx, config, host, port).await,
        Some(Commands::Status) => cmd_status(&ctx, &config),
        Some(Commands::Init { force }) => cmd_init(&ctx, force),
        Some(Commands::Ingest { file }) => cmd_ingest(&ctx, &file),
        Some(Commands::Recompute {
            window,
            kinds,
            dry_run,
        }) => cmd_recompute(&ctx, config, window, kinds.as_deref(), dry_run),
        Some(Commands::Validate) => cmd_validate(&ctx, &config),
        Some(Commands::Edges { kind, limit }) => cmd_edges(&ctx, &kind, limit),
        Some(Commands::Timeline { victim }) => cmd_timeline(&ctx, &victim),
        Some(Commands::Chain { start, depth }) => cmd_chain(&ctx, &start, depth),
        Some(Commands::Export { output, format }) => cmd_export(&ctx, &output, format),
        Some(Commands::Import { input }) => cmd_import(&ctx, &input),
        Some(Commands::Hash) => cmd_hash(&ctx),
        None => cmd_status(&ctx, &config),
    }
}
