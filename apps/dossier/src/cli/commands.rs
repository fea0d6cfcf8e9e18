//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use super::{Backend, ExportFormat};
use dossier::api;
use dossier::config::{AppConfig, parse_kinds};
use dossier_core::{
    DossierError, EdgeKind, Engine, EntityRef, GraphFacade, GraphMetrics, Loader, RecordBatch,
    RecordId, Store, all_edge_records, canonical_fingerprint, edge_records, export_canonical,
    formats::MAX_PERSISTENCE_PAYLOAD_SIZE, graph_from_bytes, graph_to_bytes, import_canonical,
    query::{case_timeline, chain_from},
    stored_edges,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum file size for record ingestion (100 MB).
const MAX_INGEST_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Maximum file size for edge import (500 MB).
const MAX_IMPORT_FILE_SIZE: u64 = 500 * 1024 * 1024;

/// Options shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    pub database: PathBuf,
    pub backend: Backend,
    pub json_mode: bool,
    pub verbose: bool,
}

fn validate_file_size(path: &Path, max_size: u64) -> Result<(), DossierError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| DossierError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(DossierError::IoError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Canonicalize an input path and make sure it names a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, DossierError> {
    let canonical = path.canonicalize().map_err(|e| {
        DossierError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(DossierError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }
    Ok(canonical)
}

/// Canonicalize the parent directory of an output path.
fn validate_output_path(path: &Path) -> Result<PathBuf, DossierError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        DossierError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(DossierError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| DossierError::IoError("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), DossierError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| DossierError::SerializationError(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(
    ctx: &Context,
    config: AppConfig,
    host: Option<String>,
    port: Option<u16>,
) -> Result<(), DossierError> {
    let store = load_store(ctx)?;
    let engine = Engine::new(config.engine)?;
    let settings = api::ApiSettings::from_config(&config.server);
    let host = host.unwrap_or(config.server.host);
    let port = port.unwrap_or(config.server.port);

    println!("Dossier Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:         {}", host);
    println!("  Port:         {}", port);
    println!("  Backend:      {}", ctx.backend.as_str());
    println!("  Database:     {:?}", ctx.database);
    println!("  Chain window: {} days", engine.config().chain_window_days);
    println!(
        "  Write key:    {}",
        if settings.write_key.is_some() { "required" } else { "not set" }
    );
    match settings.writes_per_minute {
        0 => println!("  Writes:       unthrottled"),
        n => println!("  Writes:       {} per minute", n),
    }
    println!();
    println!("Endpoints:");
    println!("  GET  /health        - Health check");
    println!("  GET  /status        - Record and edge counts");
    println!("  POST /records       - Load a record batch");
    println!("  POST /recompute     - Recompute derived edges");
    println!("  GET  /validate      - Validate stored edges");
    println!("  GET  /edges/{{kind}}  - List stored edges");
    println!("  POST /query         - Timeline, chain and record queries");
    println!("  POST /export        - Canonical export");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, store, engine, &settings).await
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show record and edge counts.
pub fn cmd_status(ctx: &Context, config: &AppConfig) -> Result<(), DossierError> {
    let store = load_store(ctx)?;
    let metrics = GraphMetrics::from_graph(&store)?;

    if ctx.json_mode {
        return print_json(&serde_json::json!({
            "database": ctx.database.to_string_lossy(),
            "backend": ctx.backend.as_str(),
            "chain_window_days": config.engine.chain_window_days,
            "metrics": metrics,
        }));
    }

    println!("Dossier Store Status");
    println!("====================");
    println!("Database: {:?}", ctx.database);
    println!("Backend:  {}", ctx.backend.as_str());
    println!("Revision: {}", metrics.revision);
    println!();
    println!(
        "Communications: {} ({} dated)",
        metrics.communication_count, metrics.dated_communications
    );
    println!(
        "Events:         {} ({} dated)",
        metrics.event_count, metrics.dated_events
    );
    println!();
    println!("Computed edges:");
    for (kind, count) in &metrics.edges {
        println!("  {:<28} {}", kind.relation_name(), count);
    }
    println!(
        "Density:        {} edges per thousand records",
        metrics.edge_density_millionths / 1_000
    );

    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new store.
pub fn cmd_init(ctx: &Context, force: bool) -> Result<(), DossierError> {
    if ctx.database.exists() {
        if !force {
            return Err(DossierError::IoError(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(&ctx.database)
            .map_err(|e| DossierError::IoError(format!("Remove old database: {}", e)))?;
    }

    match ctx.backend {
        Backend::Redb => {
            let _store = Store::with_redb(&ctx.database)?;
            println!("Initialized new redb database at {:?}", ctx.database);
        }
        Backend::File => {
            save_store(ctx, &Store::new())?;
            println!("Initialized new file database at {:?}", ctx.database);
        }
    }
    Ok(())
}

// =============================================================================
// INGEST COMMAND
// =============================================================================

/// Load a JSON record batch (`{"communications": [...], "events": [...]}`).
pub fn cmd_ingest(ctx: &Context, file: &Path) -> Result<(), DossierError> {
    tracing::info!("Ingesting records from {:?}", file);

    let validated_path = validate_file_path(file)?;
    validate_file_size(&validated_path, MAX_INGEST_FILE_SIZE)?;

    let contents = std::fs::read(&validated_path)
        .map_err(|e| DossierError::IoError(format!("Read file: {}", e)))?;
    let batch: RecordBatch = serde_json::from_slice(&contents)
        .map_err(|e| DossierError::DeserializationError(format!("Record batch: {}", e)))?;

    let mut store = load_store(ctx)?;
    let summary = Loader::load(&mut store, batch)?;
    save_store(ctx, &store)?;

    if ctx.json_mode {
        return print_json(&summary);
    }
    println!(
        "Loaded {} communications and {} events (revision {})",
        summary.communications, summary.events, summary.revision
    );
    println!("Computed edges are unchanged; run `dossier recompute` to refresh them.");
    Ok(())
}

// =============================================================================
// RECOMPUTE COMMAND
// =============================================================================

/// Recompute derived edges and print the report.
pub fn cmd_recompute(
    ctx: &Context,
    config: AppConfig,
    window: Option<u32>,
    kinds: Option<&str>,
    dry_run: bool,
) -> Result<(), DossierError> {
    let kinds = kinds.map(parse_kinds).transpose()?;
    let config = config.with_overrides(window, kinds);
    let engine = Engine::new(config.engine)?;

    let mut store = load_store(ctx)?;

    if dry_run {
        let snapshot = store.snapshot()?;
        let computed = engine.compute(&snapshot);
        let counts = computed.counts();
        if ctx.json_mode {
            return print_json(&serde_json::json!({
                "dry_run": true,
                "snapshot_revision": snapshot.revision(),
                "counts": counts,
                "fingerprint": canonical_fingerprint(&computed)?,
            }));
        }
        println!("Dry run over revision {} (nothing written)", snapshot.revision());
        for (kind, count) in &counts {
            println!("  {:<28} {}", kind.relation_name(), count);
        }
        return Ok(());
    }

    let report = engine.recompute(&mut store)?;
    save_store(ctx, &store)?;

    if ctx.json_mode {
        return print_json(&report);
    }
    println!("{}", report.render_text());
    Ok(())
}

// =============================================================================
// VALIDATE COMMAND
// =============================================================================

/// Validate the stored edges without recomputing.
pub fn cmd_validate(ctx: &Context, config: &AppConfig) -> Result<(), DossierError> {
    let store = load_store(ctx)?;
    let engine = Engine::new(config.engine.clone())?;
    let report = engine.validate_only(&store)?;

    if ctx.json_mode {
        return print_json(&report);
    }

    println!(
        "Coverage: {} of {} eligible records linked ({} per mille)",
        report
            .eligible_records
            .saturating_sub(report.isolated_records.len()),
        report.eligible_records,
        report.coverage_per_mille
    );
    if ctx.verbose {
        for id in &report.isolated_records {
            println!("  isolated: {}", id);
        }
    }
    if report.is_clean() {
        println!("No findings.");
    } else {
        println!("{} finding(s):", report.findings.len());
        for finding in &report.findings {
            println!("  - {}", finding);
        }
    }
    Ok(())
}

// =============================================================================
// EDGES COMMAND
// =============================================================================

/// List the stored edges of one kind.
pub fn cmd_edges(ctx: &Context, kind: &str, limit: usize) -> Result<(), DossierError> {
    let kind: EdgeKind = kind.parse()?;
    let store = load_store(ctx)?;
    let records = edge_records(&store.computed_edges(kind)?);

    if ctx.json_mode {
        return print_json(&records);
    }

    println!("{} ({} edges)", kind.relation_name(), records.len());
    for record in records.iter().take(limit) {
        let mut line = format!("  {} -> {}", record.from, record.to);
        if let Some(days) = record.days_diff {
            line.push_str(&format!("  ({} days)", days));
        }
        if let Some(victim) = &record.victim {
            line.push_str(&format!("  [{}]", victim));
        }
        println!("{}", line);
    }
    if records.len() > limit {
        println!("  ... and {} more", records.len().saturating_sub(limit));
    }
    Ok(())
}

// =============================================================================
// QUERY COMMANDS
// =============================================================================

/// Show a victim's events in case order.
pub fn cmd_timeline(ctx: &Context, victim: &str) -> Result<(), DossierError> {
    let store = load_store(ctx)?;
    let events = case_timeline(&store, &EntityRef::new(victim))?;

    if ctx.json_mode {
        return print_json(&events);
    }

    if events.is_empty() {
        println!("No case timeline for {} (recompute first?)", victim);
        return Ok(());
    }
    println!("Case timeline of {}:", victim);
    for (i, event) in events.iter().enumerate() {
        let date = event.date.as_ref().map(|d| d.raw()).unwrap_or("?");
        println!("  {:>3}. {:<12} {}  {}", i + 1, date, event.id, event.tags.0);
    }
    Ok(())
}

/// Walk the correspondence chain from a communication.
pub fn cmd_chain(ctx: &Context, start: &str, depth: usize) -> Result<(), DossierError> {
    let store = load_store(ctx)?;
    let start = RecordId::new(start);
    let trace =
        chain_from(&store, &start, depth)?.ok_or(DossierError::RecordNotFound(start))?;

    if ctx.json_mode {
        return print_json(&trace);
    }

    println!("Chain reached {} communications:", trace.records.len());
    for link in &trace.links {
        println!(
            "  {} -> {}  ({} days)",
            link.earlier, link.later, link.days_diff
        );
    }
    Ok(())
}

// =============================================================================
// EXPORT / IMPORT COMMANDS
// =============================================================================

/// Export every stored computed edge.
pub fn cmd_export(ctx: &Context, output: &Path, format: ExportFormat) -> Result<(), DossierError> {
    let validated_output = validate_output_path(output)?;

    let store = load_store(ctx)?;
    let edges = stored_edges(&store)?;

    let data = match format {
        ExportFormat::Canonical => export_canonical(&edges, store.revision()?)?,
        ExportFormat::Json => serde_json::to_vec_pretty(&all_edge_records(&edges))
            .map_err(|e| DossierError::SerializationError(e.to_string()))?,
    };

    std::fs::write(&validated_output, &data)
        .map_err(|e| DossierError::IoError(format!("Write file: {}", e)))?;

    println!(
        "Exported {} edges ({} bytes) to {:?}",
        edges.total(),
        data.len(),
        validated_output
    );
    Ok(())
}

/// Replace the stored edges with those of a canonical export.
pub fn cmd_import(ctx: &Context, input: &Path) -> Result<(), DossierError> {
    let validated_path = validate_file_path(input)?;
    validate_file_size(&validated_path, MAX_IMPORT_FILE_SIZE)?;

    let data = std::fs::read(&validated_path)
        .map_err(|e| DossierError::IoError(format!("Read file: {}", e)))?;
    let (revision, edges) = import_canonical(&data)?;

    let mut store = load_store(ctx)?;
    let current = store.revision()?;
    if revision != current {
        tracing::warn!(
            export_revision = revision,
            store_revision = current,
            "Importing edges computed from a different snapshot revision"
        );
    }

    // Every kind of the export lands in one write, or none does.
    store.replace_edge_kinds(edges.batches().cloned().collect())?;
    save_store(ctx, &store)?;

    println!("Imported {} edges (export revision {})", edges.total(), revision);
    Ok(())
}

/// Print the fingerprint of the stored edges.
pub fn cmd_hash(ctx: &Context) -> Result<(), DossierError> {
    let store = load_store(ctx)?;
    let edges = stored_edges(&store)?;
    let fingerprint = canonical_fingerprint(&edges)?;

    if ctx.json_mode {
        return print_json(&serde_json::json!({
            "revision": store.revision()?,
            "edges": edges.total(),
            "fingerprint": fingerprint,
        }));
    }
    println!("{}", fingerprint);
    Ok(())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Open the store named by the context.
pub fn load_store(ctx: &Context) -> Result<Store, DossierError> {
    match ctx.backend {
        Backend::Redb => Store::with_redb(&ctx.database),
        Backend::File => {
            if !ctx.database.exists() {
                return Ok(Store::new());
            }
            validate_file_size(&ctx.database, MAX_PERSISTENCE_PAYLOAD_SIZE as u64)?;
            let data = std::fs::read(&ctx.database)
                .map_err(|e| DossierError::IoError(format!("Read db: {}", e)))?;
            Ok(Store::with_graph(graph_from_bytes(&data)?))
        }
    }
}

/// Persist a file-backed store. Redb stores are already durable.
pub fn save_store(ctx: &Context, store: &Store) -> Result<(), DossierError> {
    let Some(graph) = store.memory_graph() else {
        return Ok(());
    };
    let data = graph_to_bytes(graph)?;
    std::fs::write(&ctx.database, &data)
        .map_err(|e| DossierError::IoError(format!("Write db: {}", e)))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use dossier_core::{ChainLink, EdgeBatch, EdgeSet, ReplyLink};

    fn chain(a: &str, b: &str, days: u32) -> ChainLink {
        ChainLink {
            earlier: RecordId::new(a),
            later: RecordId::new(b),
            days_diff: days,
        }
    }

    #[test]
    fn import_replaces_every_kind_of_the_export() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context {
            database: dir.path().join("store.redb"),
            backend: Backend::Redb,
            json_mode: true,
            verbose: false,
        };
        {
            let mut store = load_store(&ctx).unwrap();
            store
                .replace_edge_kinds(vec![
                    EdgeBatch::Chain(vec![chain("a", "b", 2), chain("b", "c", 3)]),
                    EdgeBatch::Reply(vec![ReplyLink {
                        reply: RecordId::new("r"),
                        original: RecordId::new("a"),
                    }]),
                ])
                .unwrap();
        }

        let mut exported = EdgeSet::new();
        exported.insert(EdgeBatch::Chain(vec![chain("a", "c", 5)]));
        let path = dir.path().join("edges.dossier");
        std::fs::write(&path, export_canonical(&exported, 0).unwrap()).unwrap();

        cmd_import(&ctx, &path).unwrap();

        let store = load_store(&ctx).unwrap();
        assert_eq!(
            store.computed_edges(EdgeKind::Chain).unwrap(),
            EdgeBatch::Chain(vec![chain("a", "c", 5)])
        );
        // Kinds missing from the export are cleared in the same write.
        assert!(store.computed_edges(EdgeKind::Reply).unwrap().is_empty());
    }

    #[test]
    fn import_rejects_corrupted_file() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context {
            database: dir.path().join("store.redb"),
            backend: Backend::Redb,
            json_mode: true,
            verbose: false,
        };
        let mut exported = EdgeSet::new();
        exported.insert(EdgeBatch::Chain(vec![chain("a", "c", 5)]));
        let mut data = export_canonical(&exported, 0).unwrap();
        if let Some(last) = data.last_mut() {
            *last ^= 0xff;
        }
        let path = dir.path().join("edges.dossier");
        std::fs::write(&path, &data).unwrap();

        assert!(cmd_import(&ctx, &path).is_err());
        let store = load_store(&ctx).unwrap();
        assert!(store.computed_edges(EdgeKind::Chain).unwrap().is_empty());
    }
}
