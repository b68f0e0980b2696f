//! CLI module for the retrieval core.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::models::OutputFormat;

/// Chunk, embed, index and search text from the command line.
#[derive(Debug, Parser)]
#[command(name = "rcore")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(long, short = 'f', global = true, help = "Output format: text or json")]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(
        long,
        short = 'c',
        global = true,
        env = "RCORE_CONFIG",
        help = "Path to a config file"
    )]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Split a file (or stdin) into chunks
    Chunk(commands::ChunkArgs),

    /// Chunk, embed and index files or directories
    Ingest(commands::IngestArgs),

    /// Search indexed content
    Search(commands::SearchArgs),

    /// Manage vector indexes
    #[command(subcommand)]
    Index(commands::IndexCommand),

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_with_filters() {
        let cli = Cli::try_parse_from([
            "rcore", "search", "borrow checker", "-n", "3", "--filter", "lang=rust", "-f", "json",
        ])
        .unwrap();
        assert_eq!(cli.format, Some(OutputFormat::Json));
        match cli.command {
            Commands::Search(args) => {
                assert_eq!(args.query, "borrow checker");
                assert_eq!(args.limit, Some(3));
                assert_eq!(args.filter, ["lang=rust"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_index_drop_requires_name() {
        assert!(Cli::try_parse_from(["rcore", "index", "drop"]).is_err());
        assert!(Cli::try_parse_from(["rcore", "index", "drop", "docs", "-y"]).is_ok());
    }
}
