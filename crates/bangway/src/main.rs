//! Bangway - personal search gateway with bang redirects and streamed answers

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use bangway::bang::{BangRegistry, QueryRoute, route_query};
use bangway::chat::ChatClient;
use bangway::config::Config;
use bangway::error::Result;
use bangway::gateway::{AppState, GatewayServer};

/// Bangway - point your browser's search box at it
#[derive(Parser)]
#[command(name = "bangway")]
#[command(about = "A personal search gateway: bang redirects and streamed LLM answers")]
#[command(version)]
pub struct Cli {
    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the gateway (default command)
    #[command(name = "serve")]
    Serve,

    /// Print where a query would be sent, without starting a server
    #[command(name = "resolve")]
    Resolve {
        /// The query, e.g. `!go http.Client`
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        query: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;
    config.validate()?;

    match cli.command {
        None | Some(Command::Serve) => serve(config).await,
        Some(Command::Resolve { query }) => resolve(&config, &query.join(" ")),
    }
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,bangway=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn serve(config: Config) -> Result<()> {
    tracing::info!("Starting Bangway");
    tracing::debug!(
        "Config loaded: listen={}, search={}, chat={} ({}), {} custom bangs",
        config.server.listen_addr,
        config.search.url,
        config.chat.api_url,
        config.chat.model,
        config.bangs.len()
    );

    // Without a key every chat answer would fail, so refuse to start.
    let chat = ChatClient::new(&config.chat)?;
    let registry = BangRegistry::from_config(&config)?;

    let state = Arc::new(AppState { registry, chat });
    let server = GatewayServer::new(config.server, state);
    server.serve().await
}

fn resolve(config: &Config, query: &str) -> Result<()> {
    let registry = BangRegistry::from_config(config)?;

    match route_query(&registry, query) {
        QueryRoute::Redirect(redirect) => println!("{}", redirect.location),
        QueryRoute::Chat => println!("chat"),
    }

    Ok(())
}
