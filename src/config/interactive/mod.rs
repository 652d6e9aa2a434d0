#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{Config, ConfigError, ServerConfig};
use crate::embeddings::openai::OpenAiClient;

#[inline]
pub fn run_interactive_config(config_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 Local RAG Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(config_dir)?;

    eprintln!("{}", style("Server Configuration").bold().yellow());
    eprintln!("Configure the OpenAI-compatible server (e.g. LM Studio) used for embeddings and chat.");
    eprintln!();

    configure_server(&mut config.server)?;

    eprintln!();
    eprintln!("{}", style("Document Locations").bold().yellow());
    configure_paths(&mut config)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    match test_server_connection(&config.server) {
        Ok(()) => {
            eprintln!(
                "{}",
                style("✓ Server connection successful, both models are loaded!").green()
            );
        }
        Err(e) => {
            eprintln!(
                "{} {:#}",
                style("⚠ Warning: Server check failed:").yellow(),
                e
            );
            eprintln!(
                "You can continue, but make sure the server is running and both models are loaded before ingesting."
            );
        }
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Server Settings:").bold().yellow());
    eprintln!("  Host: {}", style(&config.server.host).cyan());
    eprintln!("  Port: {}", style(config.server.port).cyan());
    eprintln!(
        "  Embedding Model: {}",
        style(&config.server.embedding_model).cyan()
    );
    eprintln!("  Chat Model: {}", style(&config.server.chat_model).cyan());
    eprintln!("  Batch Size: {}", style(config.server.batch_size).cyan());
    eprintln!("  Temperature: {}", style(config.server.temperature).cyan());

    eprintln!();
    match config.server_url() {
        Ok(url) => eprintln!("  Server URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Server URL: {} ({})", style("Invalid").red(), e),
    }

    eprintln!();
    eprintln!("{}", style("Retrieval Settings:").bold().yellow());
    eprintln!(
        "  Chunk Size: {} chars, Overlap: {} chars",
        style(config.chunking.chunk_size).cyan(),
        style(config.chunking.overlap).cyan()
    );
    eprintln!("  Top K: {}", style(config.retrieval.top_k).cyan());
    eprintln!(
        "  Documents: {}",
        style(config.paths.documents_dir.display()).cyan()
    );
    eprintln!("  Index: {}", style(config.paths.index_dir.display()).cyan());

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config(config_dir: &Path) -> Result<Config> {
    Config::load(config_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No usable configuration found. Using defaults.").yellow()
            );
            Ok(Config {
                base_dir: config_dir.to_path_buf(),
                ..Config::default()
            })
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        },
    )
}

fn configure_server(server: &mut ServerConfig) -> Result<()> {
    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == server.protocol)
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Server protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;

    let protocol = protocols[protocol_index].to_string();

    let host: String = Input::new()
        .with_prompt("Server host")
        .default(server.host.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = ServerConfig {
                protocol: protocol.clone(),
                host: input.clone(),
                ..ServerConfig::default()
            };
            temp_config.server_url()?;
            Ok(())
        })
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Server port")
        .default(server.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let embedding_model: String = Input::new()
        .with_prompt("Embedding model")
        .default(server.embedding_model.clone())
        .validate_with(non_empty)
        .interact_text()?;

    let chat_model: String = Input::new()
        .with_prompt("Chat model")
        .default(server.chat_model.clone())
        .validate_with(non_empty)
        .interact_text()?;

    let batch_size: u32 = Input::new()
        .with_prompt("Batch size for embedding generation")
        .default(server.batch_size)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if *input == 0 {
                Err("Batch size must be greater than 0")
            } else if *input > 1000 {
                Err("Batch size must be 1000 or less")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    server.set_protocol(protocol)?;
    server.set_host(host)?;
    server.set_port(port)?;
    server.set_embedding_model(embedding_model)?;
    server.set_chat_model(chat_model)?;
    server.set_batch_size(batch_size)?;

    Ok(())
}

fn configure_paths(config: &mut Config) -> Result<()> {
    let documents_dir: String = Input::new()
        .with_prompt("Documents directory")
        .default(config.paths.documents_dir.display().to_string())
        .validate_with(non_empty)
        .interact_text()?;

    let index_dir: String = Input::new()
        .with_prompt("Index directory")
        .default(config.paths.index_dir.display().to_string())
        .validate_with(non_empty)
        .interact_text()?;

    config.paths.documents_dir = PathBuf::from(documents_dir);
    config.paths.index_dir = PathBuf::from(index_dir);

    Ok(())
}

fn non_empty(input: &String) -> Result<(), &'static str> {
    if input.trim().is_empty() {
        Err("Value cannot be empty")
    } else {
        Ok(())
    }
}

fn test_server_connection(server: &ServerConfig) -> Result<()> {
    OpenAiClient::new(server)?
        .with_timeout(Duration::from_secs(5))
        .health_check()
}
