use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    #[command(about = "Write a config file with default values")]
    Init {
        #[arg(long, help = "Force overwrite existing config")]
        force: bool,
    },
    #[command(about = "Show the effective configuration")]
    Show,
    #[command(about = "Show the configuration file path")]
    Path,
}

/// `path` is the `--config` override, if any.
pub async fn handle_config(
    cmd: ConfigCommand,
    path: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    match cmd {
        ConfigCommand::Init { force } => handle_init(path, force, format),
        ConfigCommand::Show => handle_show(path, format),
        ConfigCommand::Path => handle_path(path, format),
    }
}

fn target_path(path: Option<&Path>) -> Result<PathBuf> {
    match path {
        Some(path) => Ok(path.to_path_buf()),
        None => Config::config_path()
            .ok_or_else(|| anyhow::anyhow!("could not determine config directory")),
    }
}

fn handle_init(path: Option<&Path>, force: bool, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let config_path = target_path(path)?;

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config already exists at: {}\nUse --force to overwrite.",
            config_path.display()
        );
    }

    Config::default()
        .save_to(&config_path)
        .context("failed to write config")?;
    println!(
        "{}",
        formatter.format_message(&format!("Created config at: {}", config_path.display()))
    );
    Ok(())
}

fn handle_show(path: Option<&Path>, format: OutputFormat) -> Result<()> {
    let mut config = Config::resolve(path)?;
    if config.index.api_key.is_some() {
        config.index.api_key = Some("********".to_string());
    }

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let source = target_path(path)?;
    if source.exists() {
        println!("# Config: {}", source.display());
    } else {
        println!("# Config: defaults ({} not found)", source.display());
    }
    println!();
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn handle_path(path: Option<&Path>, format: OutputFormat) -> Result<()> {
    let config_path = target_path(path)?;
    if format == OutputFormat::Json {
        let output = serde_json::json!({
            "path": config_path,
            "exists": config_path.exists(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", config_path.display());
    }
    Ok(())
}
