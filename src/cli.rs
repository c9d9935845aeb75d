use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "ollama-chat", about = "Chat with a local Ollama server", version)]
pub struct CliArgs {
    /// Ollama server address (overrides settings and OLLAMA_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Model to chat with
    #[arg(long, short)]
    pub model: Option<String>,

    /// Path to the settings file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print the installed models and exit
    #[arg(long)]
    pub list_models: bool,

    /// Enable debug mode with verbose logging
    #[arg(long)]
    pub debug: bool,
}
