mod anthropic_client;
mod cli;
mod config;
mod image;
#[cfg(test)]
mod testing;

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use dotenv::dotenv;
use eyre::Result;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use crate::anthropic_client::{AnthropicClient, ModelClient};
use crate::cli::chat::ChatContext;
use crate::cli::chat::graph::{ConversationGraph, MediaTypePolicy};
use crate::config::ClientConfig;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    chat: ChatArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a chat session
    Chat(ChatArgs),
}

#[derive(Args, Debug, Default)]
struct ChatArgs {
    /// Question to ask; runs a single turn and exits
    #[arg(short, long)]
    input: Option<String>,

    /// Image to analyze before answering (repeatable); runs a single turn and exits
    #[arg(long = "image", value_name = "PATH")]
    images: Vec<String>,

    /// Model to use, overriding ANTHROPIC_MODEL
    #[arg(short, long)]
    model: Option<String>,

    /// Retry a rejected image as image/jpeg, image/png, then image/gif
    #[arg(long)]
    mime_fallback: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load environment variables from .env file
    dotenv().ok();

    let cli = Cli::parse();
    let args = match cli.command {
        Some(Commands::Chat(args)) => args,
        None => cli.chat,
    };

    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Vision Chat CLI");

    let config = match ClientConfig::from_env() {
        Ok(config) => config.with_model(args.model),
        Err(e) => {
            eprintln!("Failed to initialize Anthropic client: {}", e);
            return Ok(ExitCode::FAILURE);
        }
    };

    let client = Arc::new(AnthropicClient::new(config)?);
    info!("Using model {}", client.model_id());

    let policy = if args.mime_fallback {
        MediaTypePolicy::Fallback
    } else {
        MediaTypePolicy::Detect
    };
    let graph = ConversationGraph::new(client, policy);

    let mut chat_context = ChatContext::new(Box::new(io::stdout()), args.input, args.images, graph);
    chat_context.run().await
}
