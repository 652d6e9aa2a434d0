use clap::{Parser, Subcommand};
use local_rag::Result;
use local_rag::commands::{ask, chat, ingest, show_status};
use local_rag::config::{Config, run_interactive_config, show_config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "local-rag")]
#[command(about = "Answer questions about local documents with a locally hosted LLM")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml (defaults to ~/.local-rag)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the inference server connection and paths
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Chunk, embed and index every document in the documents directory
    Ingest {
        /// Override the documents directory
        #[arg(long)]
        documents: Option<PathBuf>,
        /// Override the index directory
        #[arg(long)]
        index: Option<PathBuf>,
    },
    /// Ask questions interactively until 'exit' or 'quit'
    Chat,
    /// Ask a single question
    Ask {
        /// The question to answer
        question: String,
    },
    /// Show the configuration and the contents of the index
    Status,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => Config::default_dir()?,
    };

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&config_dir)?;
            } else {
                run_interactive_config(&config_dir)?;
            }
        }
        Commands::Ingest { documents, index } => {
            let mut config = Config::load(&config_dir)?;
            if let Some(documents) = documents {
                config.paths.documents_dir = documents;
            }
            if let Some(index) = index {
                config.paths.index_dir = index;
            }
            ingest(&config)?;
        }
        Commands::Chat => {
            chat(&Config::load(&config_dir)?)?;
        }
        Commands::Ask { question } => {
            ask(&Config::load(&config_dir)?, &question)?;
        }
        Commands::Status => {
            show_status(&Config::load(&config_dir)?)?;
        }
    }

    Ok(())
}
