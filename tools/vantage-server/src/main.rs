//! Vantage Relay Server
//!
//! Standalone relay that accepts monitored endpoints and operator
//! consoles over WebSocket. Also issues admin session tokens.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use vantage_core::TokenGateway;
use vantage_relay::{Registry, Relay, RelayConfig};
use vantage_store::SqliteStore;

#[derive(Parser)]
#[command(name = "vantage-server")]
#[command(about = "Vantage Relay Server")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay (default)
    Serve(ServeArgs),

    /// Issue an admin session token
    Token(TokenArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:3050")]
    listen: SocketAddr,

    /// Device database path
    #[arg(long, default_value = "vantage.db")]
    db: PathBuf,

    /// Session token signing secret
    #[arg(long, env = "VANTAGE_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Server name used in logs
    #[arg(short, long, default_value = "Vantage Relay")]
    name: String,

    /// Maximum concurrent sessions
    #[arg(long, default_value_t = 256)]
    max_sessions: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Default for ServeArgs {
    fn default() -> Self {
        Self {
            listen: ([0, 0, 0, 0], vantage_core::DEFAULT_WS_PORT).into(),
            db: PathBuf::from("vantage.db"),
            secret: None,
            name: "Vantage Relay".to_string(),
            max_sessions: 256,
            verbose: false,
        }
    }
}

#[derive(Args)]
struct TokenArgs {
    /// Principal the token is issued to
    principal: String,

    /// Token lifetime in seconds
    #[arg(long, default_value_t = 43_200)]
    ttl: u64,

    /// Session token signing secret
    #[arg(long, env = "VANTAGE_SECRET", hide_env_values = true)]
    secret: Option<String>,
}

fn require_secret(secret: Option<String>) -> Result<String> {
    secret.context("signing secret required (pass --secret or set VANTAGE_SECRET)")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve(ServeArgs::default())) {
        Commands::Serve(args) => serve(args).await,
        Commands::Token(args) => issue_token(args),
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let secret = require_secret(args.secret)?;

    tracing::info!("Starting {}", args.name);
    tracing::info!("Listening on: {}", args.listen);
    tracing::info!("Device database: {}", args.db.display());

    let store = Arc::new(SqliteStore::open(&args.db)?);
    let registry = Arc::new(Registry::new(
        Arc::new(TokenGateway::new(secret.as_bytes())),
        store.clone(),
        store,
    ));

    let relay = Relay::new(
        RelayConfig {
            name: args.name,
            max_sessions: args.max_sessions,
        },
        registry,
    );

    tracing::info!("Relay ready, accepting connections...");
    relay.serve_websocket(&args.listen.to_string()).await?;

    Ok(())
}

fn issue_token(args: TokenArgs) -> Result<()> {
    let secret = require_secret(args.secret)?;
    let gateway = TokenGateway::new(secret.as_bytes());
    let token = gateway.issue_session_token(&args.principal, Duration::from_secs(args.ttl))?;
    println!("{token}");
    Ok(())
}
