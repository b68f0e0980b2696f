//! Ingest command implementation.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use crate::cli::output::{IngestStats, get_formatter};
use crate::models::{Config, Metadata, OutputFormat};
use crate::services::Pipeline;
use crate::utils::file::{checksum, collect_files, document_id, read_bytes};

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Files or directories to ingest
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Target index (defaults to index.name from config)
    #[arg(long, short = 'i')]
    pub index: Option<String>,

    /// File patterns to exclude (can be specified multiple times)
    #[arg(long, short = 'e')]
    pub exclude: Vec<String>,

    /// Extra metadata attached to every chunk (key=value, repeatable)
    #[arg(long, short = 'm')]
    pub meta: Vec<String>,

    /// Show what would be ingested without touching the index
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn handle_ingest(
    args: IngestArgs,
    config: Config,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let formatter = get_formatter(format);

    let mut exclude = config.chunking.exclude_patterns.clone();
    exclude.extend(args.exclude.iter().cloned());
    let files = discover(&args.paths, &exclude)?;

    if files.is_empty() {
        println!("{}", formatter.format_message("No files found to ingest."));
        return Ok(());
    }

    if args.dry_run {
        println!(
            "{}",
            formatter.format_message(&format!("Dry run: would ingest {} files", files.len()))
        );
        for file in &files {
            println!("  {}", file.display());
        }
        return Ok(());
    }

    let base = parse_meta(&args.meta)?;
    let index_name = args.index.as_deref().unwrap_or(&config.index.name);
    let pipeline = super::build_pipeline(&config, index_name).await?;

    let stats = ingest_files(&pipeline, &files, &config, base, true, verbose).await?;
    print!("{}", formatter.format_ingest_stats(&stats));

    if !stats.chunks_failed.is_empty() {
        anyhow::bail!("{} chunks failed to index", stats.chunks_failed.len());
    }
    Ok(())
}

/// Canonicalize each root and collect its files.
pub(crate) fn discover(paths: &[PathBuf], exclude: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        let root = path
            .canonicalize()
            .with_context(|| format!("invalid path: {}", path.display()))?;
        files.extend(collect_files(&root, exclude).context("invalid exclude pattern")?);
    }
    files.sort();
    files.dedup();
    Ok(files)
}

/// Ingest `files` one document at a time. Unreadable or non-UTF-8 files are
/// skipped; index failures are collected per chunk.
pub(crate) async fn ingest_files(
    pipeline: &Pipeline,
    files: &[PathBuf],
    config: &Config,
    base: Metadata,
    show_progress: bool,
    verbose: bool,
) -> Result<IngestStats> {
    let start_time = Instant::now();
    let mut stats = IngestStats {
        index: pipeline.index().name().to_string(),
        files_scanned: files.len() as u64,
        ..Default::default()
    };

    let pb = if show_progress {
        progress_bar(files.len() as u64)
    } else {
        ProgressBar::hidden()
    };

    for path in files {
        pb.inc(1);

        let text = match read_text(path, config.chunking.max_file_size) {
            Ok(text) => text,
            Err(e) => {
                if verbose {
                    pb.println(format!("Skipping {}: {e:#}", path.display()));
                }
                tracing::debug!(path = %path.display(), error = %e, "skipping file");
                stats.files_skipped += 1;
                continue;
            }
        };

        let doc_id = document_id(path);
        let mut metadata = base.clone();
        metadata.insert(
            "path".to_string(),
            path.to_string_lossy().into_owned().into(),
        );
        metadata.insert("checksum".to_string(), checksum(&text).into());
        metadata.insert("ingested_at".to_string(), Utc::now().to_rfc3339().into());

        let report = pipeline
            .ingest(&doc_id, &text, Some(metadata))
            .await
            .with_context(|| format!("failed to ingest {}", path.display()))?;

        if report.total() == 0 {
            stats.files_skipped += 1;
            continue;
        }
        stats.files_indexed += 1;
        stats.chunks_indexed += report.succeeded.len() as u64;
        stats.chunks_failed.extend(report.summary().failed);
    }

    pb.finish_and_clear();
    stats.duration_ms = start_time.elapsed().as_millis() as u64;
    Ok(stats)
}

fn read_text(path: &Path, max_size: u64) -> Result<String> {
    let bytes = read_bytes(path, max_size)?;
    String::from_utf8(bytes).context("file is not valid UTF-8")
}

fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

fn parse_meta(pairs: &[String]) -> Result<Metadata> {
    let mut metadata = Metadata::new();
    if let Some(filter) = super::parse_filter(pairs)? {
        for (key, value) in filter.must {
            metadata.insert(key, value);
        }
    }
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::build_pipeline;

    #[tokio::test]
    async fn test_ingest_files_skips_binary_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "Ownership moves values. Borrowing does not.").unwrap();
        std::fs::write(dir.path().join("blank.txt"), "   ").unwrap();
        std::fs::write(dir.path().join("bad.txt"), [0xffu8, 0xfe, 0x00]).unwrap();

        let files = discover(&[dir.path().to_path_buf()], &[]).unwrap();
        let config = Config::default();
        let pipeline = build_pipeline(&config, "ingest-test").await.unwrap();

        let stats = ingest_files(&pipeline, &files, &config, Metadata::new(), false, false)
            .await
            .unwrap();
        assert_eq!(stats.files_indexed, 1);
        assert_eq!(stats.files_skipped, 2);
        assert_eq!(stats.chunks_indexed, 2);
        assert!(stats.chunks_failed.is_empty());
        assert_eq!(pipeline.index().count().await.unwrap(), 2);
    }

    #[test]
    fn test_parse_meta() {
        let meta = parse_meta(&["team=search".to_string()]).unwrap();
        assert_eq!(meta.get("team").and_then(|v| v.as_str()), Some("search"));
    }
}
