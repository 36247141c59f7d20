use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use lms_api::app::{app, AppState};
use lms_api::auth::{generate_jwt, Claims};
use lms_api::config::{AppConfig, DatabaseBackend};
use lms_api::database::{DatabaseManager, MemoryStore, PgStore, Store};
use lms_api::guard::RolePolicy;
use lms_api::services::{LocalFileStorage, LogNotifier, Notifier, StripeGateway, WebhookNotifier};

#[derive(Parser)]
#[command(name = "lms-api")]
#[command(about = "Multi-tenant learning-management platform API")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run the HTTP server (default)")]
    Serve {
        #[arg(long, help = "Port to bind, overriding configuration")]
        port: Option<u16>,
    },

    #[command(about = "Mint a bearer token for a user (development only)")]
    Token {
        #[arg(long, help = "Public id of the user")]
        user: Uuid,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so DATABASE_URL, JWT_SECRET, etc. are picked up
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,lms_api=debug")))
        .init();

    let config = lms_api::config::config();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Serve { port } => serve(config, port).await,
        Commands::Token { user } => {
            if !lms_api::is_development!() {
                anyhow::bail!("tokens can only be minted in development");
            }
            let claims = Claims::new(user, config.security.jwt_expiry_hours);
            println!("{}", generate_jwt(&claims, &config.security.jwt_secret)?);
            Ok(())
        }
    }
}

async fn serve(config: &AppConfig, port: Option<u16>) -> anyhow::Result<()> {
    tracing::info!("Starting LMS API in {:?} mode", config.environment);

    let store: Arc<dyn Store> = match config.database.backend {
        DatabaseBackend::Memory => {
            tracing::warn!("Using the in-memory store; data is lost on exit");
            Arc::new(MemoryStore::new())
        }
        DatabaseBackend::Postgres => {
            let pool = DatabaseManager::connect(&config.database).await?;
            if config.database.run_migrations {
                DatabaseManager::migrate(&pool).await?;
            }
            Arc::new(PgStore::new(pool))
        }
    };

    let notifier: Arc<dyn Notifier> = match &config.notifications.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone())),
        None => Arc::new(LogNotifier),
    };

    let state = AppState {
        config: Arc::new(config.clone()),
        policy: Arc::new(RolePolicy),
        store,
        storage: Arc::new(LocalFileStorage::new(&config.storage).context("invalid storage configuration")?),
        payments: Arc::new(StripeGateway::new(&config.payments).context("invalid payments configuration")?),
        notifier,
    };

    let bind_addr = format!("{}:{}", config.server.host, port.unwrap_or(config.server.port));
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("LMS API listening on http://{}", bind_addr);
    axum::serve(listener, app(state)).await?;
    Ok(())
}
