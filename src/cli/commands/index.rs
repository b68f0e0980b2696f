//! Index command implementation.

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::cli::output::{Formatter, IndexInfo, get_formatter};
use crate::models::{Config, Metric, OutputFormat, Placement};
use crate::services::{DeleteAll, VectorIndexManager};

#[derive(Debug, Subcommand)]
pub enum IndexCommand {
    /// List indexes on the configured backend
    List,

    /// Create an index, or confirm an existing one matches
    Create {
        /// Index name (defaults to index.name from config)
        name: Option<String>,

        /// Vector dimension (defaults to encoder.dimension)
        #[arg(long, short = 'd')]
        dimension: Option<usize>,

        /// Similarity metric: cosine, dotproduct or euclidean
        #[arg(long, short = 'm')]
        metric: Option<Metric>,

        #[arg(long)]
        shards: Option<u32>,

        #[arg(long)]
        replicas: Option<u32>,
    },

    /// Show an index's configuration and record count
    Info {
        name: Option<String>,
    },

    /// Delete every record in an index, keeping the index
    Clear {
        name: Option<String>,

        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        force: bool,
    },

    /// Drop an index and all of its records
    Drop {
        name: String,

        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        force: bool,
    },
}

pub async fn handle_index(
    cmd: IndexCommand,
    config: Config,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let formatter = get_formatter(format);
    let manager = VectorIndexManager::from_config(&config.index)
        .await
        .with_context(|| format!("failed to connect to {} backend", config.index.driver))?;

    if verbose {
        eprintln!("Backend: {} ({})", config.index.driver, config.index.url);
    }

    match cmd {
        IndexCommand::List => handle_list(&manager, formatter.as_ref()).await,
        IndexCommand::Create {
            name,
            dimension,
            metric,
            shards,
            replicas,
        } => {
            let name = name.unwrap_or_else(|| config.index.name.clone());
            let dimension = dimension.unwrap_or(config.encoder.dimension as usize);
            let metric = metric.unwrap_or(config.index.metric);
            let mut placement = config.index.placement.clone();
            if let Some(shards) = shards {
                placement.shards = shards;
            }
            if let Some(replicas) = replicas {
                placement.replicas = replicas;
            }
            handle_create(&manager, &name, dimension, metric, placement, formatter.as_ref())
                .await
        }
        IndexCommand::Info { name } => {
            let name = name.unwrap_or_else(|| config.index.name.clone());
            handle_info(&manager, &name, formatter.as_ref()).await
        }
        IndexCommand::Clear { name, force } => {
            let name = name.unwrap_or_else(|| config.index.name.clone());
            handle_clear(&manager, &name, force, formatter.as_ref()).await
        }
        IndexCommand::Drop { name, force } => {
            handle_drop(&manager, &name, force, formatter.as_ref()).await
        }
    }
}

async fn handle_list(manager: &VectorIndexManager, formatter: &dyn Formatter) -> Result<()> {
    let mut infos = Vec::new();
    for name in manager.list_index_names().await? {
        let index = manager.connect(&name).await?;
        let records = index.count().await?;
        infos.push(IndexInfo {
            descriptor: index.descriptor().clone(),
            records,
        });
    }
    print!("{}", formatter.format_index_list(&infos));
    Ok(())
}

async fn handle_create(
    manager: &VectorIndexManager,
    name: &str,
    dimension: usize,
    metric: Metric,
    placement: Placement,
    formatter: &dyn Formatter,
) -> Result<()> {
    let index = manager
        .ensure_index(name, dimension, metric, placement)
        .await
        .with_context(|| format!("failed to create index '{name}'"))?;
    let info = IndexInfo {
        descriptor: index.descriptor().clone(),
        records: index.count().await?,
    };
    print!("{}", formatter.format_index_info(&info));
    Ok(())
}

async fn handle_info(
    manager: &VectorIndexManager,
    name: &str,
    formatter: &dyn Formatter,
) -> Result<()> {
    let index = manager.connect(name).await?;
    let info = IndexInfo {
        descriptor: index.descriptor().clone(),
        records: index.count().await?,
    };
    print!("{}", formatter.format_index_info(&info));
    Ok(())
}

async fn handle_clear(
    manager: &VectorIndexManager,
    name: &str,
    force: bool,
    formatter: &dyn Formatter,
) -> Result<()> {
    let index = manager.connect(name).await?;

    if !force && !super::confirm(&format!("This will delete ALL records in '{name}'. Continue?"))? {
        println!("{}", formatter.format_message("Cancelled."));
        return Ok(());
    }

    index
        .delete_all(DeleteAll::confirm(name))
        .await
        .with_context(|| format!("failed to clear index '{name}'"))?;
    println!(
        "{}",
        formatter.format_message(&format!("All records in '{name}' have been deleted."))
    );
    Ok(())
}

async fn handle_drop(
    manager: &VectorIndexManager,
    name: &str,
    force: bool,
    formatter: &dyn Formatter,
) -> Result<()> {
    if !force && !super::confirm(&format!("This will drop index '{name}'. Continue?"))? {
        println!("{}", formatter.format_message("Cancelled."));
        return Ok(());
    }

    let message = if manager.drop_index(name, &DeleteAll::confirm(name)).await? {
        format!("Index '{name}' dropped.")
    } else {
        format!("Index '{name}' does not exist.")
    };
    println!("{}", formatter.format_message(&message));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::output::JsonFormatter;

    #[tokio::test]
    async fn test_create_then_info_then_drop() {
        let manager = VectorIndexManager::from_config(&Config::default().index)
            .await
            .unwrap();
        let formatter = JsonFormatter::new(false);

        handle_create(
            &manager,
            "cli-index",
            8,
            Metric::Euclidean,
            Placement::default(),
            &formatter,
        )
        .await
        .unwrap();
        handle_info(&manager, "cli-index", &formatter).await.unwrap();
        handle_clear(&manager, "cli-index", true, &formatter)
            .await
            .unwrap();
        handle_drop(&manager, "cli-index", true, &formatter)
            .await
            .unwrap();

        assert!(manager.describe("cli-index").await.unwrap().is_none());
        assert!(handle_info(&manager, "cli-index", &formatter).await.is_err());
    }
}
