//! Burrow CLI
//!
//! Command-line interface for one-shot analysis and offline queries.

mod output;

use anyhow::{Context, Result};
use burrow_analyzer::{
    AnalyzerConfig, AnalyzerRegistry, IndexReader, IndexWriter, Query, StreamAnalyzer,
};
use burrow_core::DaemonConfig;
use burrow_indexer::{FileLister, FilterManager, MemoryIndex, WalkLister};
use clap::{Parser, Subcommand};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use output::JsonLinesWriter;

#[derive(Parser)]
#[command(name = "burrow")]
#[command(about = "burrow - extract metadata and text from nested files")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze files and directories, printing one JSON object per unit
    Index {
        /// Files or directories to analyze
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Compute a SHA-256 digest of every unit
        #[arg(long)]
        digest: bool,

        /// Deepest nesting level to analyze
        #[arg(long, default_value_t = 32)]
        max_depth: u32,

        /// Honour .gitignore files while walking directories
        #[arg(long)]
        gitignore: bool,
    },

    /// Query a persisted index
    Query {
        /// Search terms; all must match
        #[arg(required = true)]
        terms: Vec<String>,

        /// Index snapshot (default: the daemon's index)
        #[arg(long)]
        index: Option<PathBuf>,

        /// Maximum number of results
        #[arg(long, default_value_t = 10)]
        max: usize,

        /// Results to skip
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },

    /// List registered analyzers and fields
    Fields,
}

fn main() -> Result<()> {
    // Simple logging for CLI
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::Index {
            paths,
            digest,
            max_depth,
            gitignore,
        } => {
            let config = AnalyzerConfig {
                enable_digest: digest,
                max_depth,
                ..Default::default()
            };
            cmd_index(&paths, config, gitignore)
        }
        Commands::Query {
            terms,
            index,
            max,
            offset,
        } => cmd_query(&terms, index, max, offset),
        Commands::Fields => cmd_fields(),
    }
}

fn cmd_index(paths: &[PathBuf], config: AnalyzerConfig, gitignore: bool) -> Result<()> {
    let mut analyzer = StreamAnalyzer::new(AnalyzerRegistry::with_defaults(config));
    let writer = JsonLinesWriter::new(BufWriter::new(std::io::stdout()));
    let mut lister = WalkLister::new(Arc::new(FilterManager::empty()), gitignore);
    let mut failed = 0usize;

    for path in paths {
        if path.is_dir() {
            let root = path
                .to_str()
                .with_context(|| format!("Path is not valid UTF-8: {}", path.display()))?;
            let mut files = Vec::new();
            lister
                .list_files(root, &mut |file| {
                    files.push(file.path.to_string());
                    true
                })
                .with_context(|| format!("Failed to list {}", path.display()))?;
            for file in files {
                if let Err(e) = analyzer.analyze_file(Path::new(&file), &writer) {
                    tracing::debug!(path = %file, error = %e, "Analysis incomplete");
                    failed += 1;
                }
            }
        } else if let Err(e) = analyzer.analyze_file(path, &writer) {
            eprintln!("{}: {}", path.display(), e);
            failed += 1;
        }
    }

    writer.commit().context("Failed to flush output")?;
    eprintln!("{} units written, {} files incomplete", writer.written(), failed);
    Ok(())
}

fn cmd_query(terms: &[String], index: Option<PathBuf>, max: usize, offset: usize) -> Result<()> {
    let path = index.unwrap_or_else(|| DaemonConfig::load().index_path());
    if !path.exists() {
        anyhow::bail!("No index at {}", path.display());
    }
    let index = MemoryIndex::open(&path)
        .with_context(|| format!("Failed to open index {}", path.display()))?;

    let query = Query::parse(&terms.join(" "));
    let hits = index.count_hits(&query);
    let mut out = std::io::stdout().lock();
    for doc in index.query(&query, max, offset) {
        writeln!(out, "{}", serde_json::to_string(&doc)?)?;
    }
    eprintln!("{} hits", hits);
    Ok(())
}

fn cmd_fields() -> Result<()> {
    let registry = AnalyzerRegistry::with_defaults(AnalyzerConfig::default());
    let mut out = std::io::stdout().lock();

    writeln!(out, "Analyzers:")?;
    for (kind, name) in registry.analyzers() {
        writeln!(out, "  {:<8} {}", kind.as_str(), name)?;
    }
    writeln!(out, "Fields:")?;
    for (_, info) in registry.fields().iter() {
        let max = if info.max_occurs == 0 {
            "unlimited".to_string()
        } else {
            info.max_occurs.to_string()
        };
        writeln!(out, "  {:<28} {:?} (max {})", info.name, info.field_type, max)?;
    }
    Ok(())
}
