//! Toolarr MCP Gateway - Entry Point

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use toolarr_mcp::{
    config::Config,
    server::McpServer,
    tools::{ToolRegistry, builtin},
};

#[derive(Parser, Debug)]
#[command(name = "toolarr-mcp")]
#[command(about = "MCP gateway with an embedded OAuth 2.0 authorization server")]
#[command(version)]
struct Cli {
    /// HTTP server port
    #[arg(long, default_value = "8000", env = "PORT")]
    port: u16,

    /// Public base URL used in OAuth metadata (e.g., https://tools.example.com)
    #[arg(long, env = "BASE_URL")]
    base_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        subscriber.with(tracing_subscriber::fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.json_logs);

    let mut config = Config::from_env()?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url.trim_end_matches('/').to_string();
    }

    if config.api_key.is_none() && config.static_client().is_none() {
        tracing::warn!("No static credentials configured; only OAuth-issued credentials will be accepted");
    }

    let mut registry = ToolRegistry::new();
    builtin::register_builtin_tools(&mut registry)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), tools = registry.len(), "Starting Toolarr MCP gateway");

    McpServer::new(config, registry).run_http(cli.port).await
}
