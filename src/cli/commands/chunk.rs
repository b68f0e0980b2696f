use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::output::get_formatter;
use crate::models::{ChunkStrategy, Config, OutputFormat};
use crate::services::build_chunker;

#[derive(Debug, Args)]
pub struct ChunkArgs {
    #[arg(help = "File to chunk; reads stdin when omitted or '-'")]
    pub path: Option<PathBuf>,

    #[arg(long, short = 's', help = "Chunking strategy: sentence or window")]
    pub strategy: Option<ChunkStrategy>,

    #[arg(long, help = "Window size in characters")]
    pub size: Option<u32>,

    #[arg(long, help = "Window overlap in characters")]
    pub overlap: Option<u32>,
}

pub async fn handle_chunk(
    args: ChunkArgs,
    mut config: Config,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let formatter = get_formatter(format);

    if let Some(strategy) = args.strategy {
        config.chunking.strategy = strategy;
    }
    if let Some(size) = args.size {
        config.chunking.chunk_size = size;
    }
    if let Some(overlap) = args.overlap {
        config.chunking.chunk_overlap = overlap;
    }
    config.validate()?;

    let bytes = match args.path.as_deref() {
        Some(path) if path.as_os_str() != "-" => std::fs::read(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        _ => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .context("failed to read stdin")?;
            buf
        }
    };

    let chunker = build_chunker(&config.chunking);
    let chunks = chunker.chunk_bytes(&bytes)?;

    if verbose {
        eprintln!(
            "Chunked {} bytes into {} chunks ({})",
            bytes.len(),
            chunks.len(),
            chunker.name()
        );
    }

    print!("{}", formatter.format_chunks(&chunks));
    Ok(())
}
