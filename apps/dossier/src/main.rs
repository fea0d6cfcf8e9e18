//! # Dossier
//!
//! The binary for the Dossier derived-relationship engine.
//!
//! This application provides:
//! - CLI interface for loading records, recomputing and inspecting edges
//! - HTTP REST API server (axum-based)
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                apps/dossier (THE BINARY)             │
//! │                                                      │
//! │   ┌─────────────┐   ┌─────────────┐   ┌──────────┐   │
//! │   │    CLI      │   │  HTTP API   │   │  config  │   │
//! │   │   (clap)    │   │   (axum)    │   │  (toml)  │   │
//! │   └──────┬──────┘   └──────┬──────┘   └────┬─────┘   │
//! │          └─────────────────┼───────────────┘         │
//! │                            ▼                         │
//! │                   ┌────────────────┐                 │
//! │                   │  dossier-core  │                 │
//! │                   │  (THE ENGINE)  │                 │
//! │                   └────────────────┘                 │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! dossier init
//! dossier ingest -f records.json
//! dossier recompute --window 14
//! dossier timeline person/leopold-w
//! dossier server --port 8080
//! ```

mod cli;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // DOSSIER_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("DOSSIER_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "dossier=info,dossier_core=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

fn print_banner() {
    println!(
        r#"
  ___   ___  ___ ___ ___ ___ ___
 |   \ / _ \/ __/ __|_ _| __| _ \
 | |) | (_) \__ \__ \| || _||   /
 |___/ \___/|___/___/___|___|_|_\

  Derived relationships v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
