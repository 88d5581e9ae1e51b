mod config;
mod error;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use mcp::Endpoint;
use runtime::{Agent, ModelGateway, OllamaBackend, ToolSession};
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use error::Result;

const DEFAULT_LOG_FILTER: &str = "tether=info,runtime=info,mcp=warn";

#[derive(Parser)]
#[command(name = "tether")]
#[command(about = "Chat with a local model that can call MCP tools", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./tether.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Model name, overriding the config file
    #[arg(short, long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session
    Chat,
    /// Print the tool server's catalog as the model sees it
    Tools,
    /// List models available on the backend
    Models,
}

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::discover(cli.config.as_deref())?;
    if let Some(model) = cli.model {
        config.model.name = model;
    }

    match cli.command {
        Some(Commands::Chat) | None => cmd_chat(&config).await,
        Some(Commands::Tools) => cmd_tools(&config).await,
        Some(Commands::Models) => cmd_models(&config).await,
    }
}

fn backend(config: &Config) -> OllamaBackend {
    OllamaBackend::builder(&config.model.name)
        .base_url(&config.model.base_url)
        .temperature(config.model.temperature)
        .max_tokens(config.model.max_tokens)
        .build()
}

fn session(config: &Config) -> Result<Arc<ToolSession<Endpoint>>> {
    let endpoint = config.endpoint()?;
    info!(%endpoint, "tool server");
    Ok(Arc::new(ToolSession::with_config(
        endpoint,
        config.session_config(),
    )))
}

async fn cmd_chat(config: &Config) -> Result<()> {
    println!("tether v{}", env!("CARGO_PKG_VERSION"));

    let mut gateway = ModelGateway::new(backend(config)).with_timeout(config.query_timeout());
    if let Some(system) = &config.agent.system_prompt {
        gateway = gateway.with_system(system);
    }

    let session = session(config)?;
    let catalog = session.connect().await?;

    println!("Model: {}", config.model.name);
    println!(
        "Tools: {}",
        catalog
            .iter()
            .map(|tool| tool.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("Type 'quit' or Ctrl+D to exit, '/reset' to start over.\n");

    let mut agent = Agent::start(gateway, session, config.agent_config());

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            // EOF
            break;
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "quit" || input == "exit" {
            break;
        }
        if input == "/reset" {
            agent.reset();
            println!("Conversation cleared.\n");
            continue;
        }

        match agent.submit(input).await {
            Ok(response) => {
                println!("\n{response}\n");
            }
            Err(e) => {
                eprintln!("Error: {e}\n");
            }
        }
    }

    agent.shutdown().await;
    println!("\nSession ended.");
    Ok(())
}

async fn cmd_tools(config: &Config) -> Result<()> {
    let session = session(config)?;
    let catalog = session.connect().await?;
    session.disconnect().await;

    println!("{}", serde_json::to_string_pretty(&*catalog)?);
    Ok(())
}

async fn cmd_models(config: &Config) -> Result<()> {
    let models = backend(config).list_models().await?;

    if models.is_empty() {
        println!("No models installed.");
        return Ok(());
    }

    for name in models {
        let marker = if name == config.model.name { "*" } else { " " };
        println!("{marker} {name}");
    }
    Ok(())
}
