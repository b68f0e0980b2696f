use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::output::get_formatter;
use crate::models::{Config, Metadata, OutputFormat};

#[derive(Debug, Args)]
pub struct SearchArgs {
    #[arg(required = true, help = "Search query text")]
    pub query: String,

    #[arg(long, short = 'n', help = "Maximum number of results to return")]
    pub limit: Option<u32>,

    #[arg(long, short = 'i', help = "Index to search (defaults to index.name)")]
    pub index: Option<String>,

    #[arg(
        long,
        help = "Metadata equality filter, key=value (can be specified multiple times)"
    )]
    pub filter: Vec<String>,

    #[arg(long, short = 'r', help = "Re-rank candidates with the configured re-ranker")]
    pub rerank: bool,

    #[arg(long, help = "Skip re-ranking even when enabled in config")]
    pub no_rerank: bool,

    #[arg(
        long,
        help = "Ingest these files or directories before searching (useful with the memory driver)"
    )]
    pub corpus: Vec<PathBuf>,
}

pub async fn handle_search(
    args: SearchArgs,
    config: Config,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let query = args.query.trim();
    if query.is_empty() {
        anyhow::bail!("search query cannot be empty");
    }

    let formatter = get_formatter(format);
    let start_time = Instant::now();

    let limit = args.limit.unwrap_or(config.search.default_top_k);
    if limit == 0 {
        anyhow::bail!("limit must be at least 1");
    }

    let filter = super::parse_filter(&args.filter).context("failed to parse filter")?;
    let rerank = !args.no_rerank && (args.rerank || config.search.rerank);
    let index_name = args.index.as_deref().unwrap_or(&config.index.name);

    if verbose {
        eprintln!("Query: \"{query}\"");
        eprintln!("  Index: {index_name}");
        eprintln!("  Limit: {limit}");
        if let Some(filter) = &filter {
            for (key, value) in &filter.must {
                eprintln!("  Filter: {key}={value}");
            }
        }
    }

    let pipeline = super::build_pipeline(&config, index_name).await?;
    if rerank && !pipeline.has_reranker() {
        anyhow::bail!("re-ranking requested but encoder.reranker.kind is none");
    }

    if !args.corpus.is_empty() {
        let files = super::ingest::discover(&args.corpus, &config.chunking.exclude_patterns)?;
        let stats = super::ingest::ingest_files(
            &pipeline,
            &files,
            &config,
            Metadata::new(),
            false,
            verbose,
        )
        .await?;
        if verbose {
            eprintln!(
                "  Corpus: {} files, {} chunks in {}ms",
                stats.files_indexed, stats.chunks_indexed, stats.duration_ms
            );
        }
    }

    let results = pipeline
        .search(query, limit as usize, filter.as_ref(), rerank)
        .await
        .context("search failed")?;

    if verbose {
        eprintln!("Timing:");
        eprintln!("  Search: {}ms", results.duration_ms);
        eprintln!("  Total: {}ms", start_time.elapsed().as_millis());
        eprintln!();
    }

    print!("{}", formatter.format_search_results(&results));
    Ok(())
}
