//! chat2anyllm: chat backend in front of a LiteLLM aggregator.

use std::path::PathBuf;
use std::sync::Arc;

use chat2anyllm_core::config::DEFAULT_DATABASE_PATH;
use chat2anyllm_core::ServerConfig;
use chat2anyllm_server::{build_router, check, AppState};
use chat2anyllm_store::SqliteStore;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(String::as_str) {
        None | Some("serve") => serve().await,
        Some("--validate") | Some("validate") => {
            let db_path = match args.get(2) {
                Some(path) => PathBuf::from(path),
                None => ServerConfig::from_env()?
                    .database_path
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH)),
            };
            let report = check::validate(&db_path);
            check::print_report(&report);
            std::process::exit(if report.db_valid { 0 } else { 1 });
        }
        Some("--help") | Some("-h") | Some("help") => {
            println!("chat2anyllm: chat backend for LiteLLM");
            println!();
            println!("Usage: chat2anyllm [command]");
            println!();
            println!("Commands:");
            println!("  serve (default)          Start the server");
            println!("  validate [db-path]       Check an existing database");
            println!("  help                     Show this help message");
            println!();
            println!("Configuration is read from the environment and .env:");
            println!("  PORT, LITELLM_ENDPOINT, LITELLM_API_KEY, DATABASE_PATH,");
            println!("  JWT_SECRET, JWT_EXPIRES_IN, ALLOWED_ORIGINS, CORS_ALLOW_ALL");
            Ok(())
        }
        Some(other) => {
            eprintln!("Unknown command: {}. Use 'chat2anyllm help' for usage.", other);
            std::process::exit(1);
        }
    }
}

async fn serve() -> anyhow::Result<()> {
    let config = ServerConfig::from_env()?;
    let port = config.port;

    info!("LiteLLM endpoint: {}", config.litellm_endpoint);
    info!("LiteLLM API key present: {}", !config.litellm_api_key.is_empty());
    info!("CORS policy: {:?}", config.cors);
    if config.uses_default_secret() {
        warn!("JWT_SECRET is not set; tokens are signed with the built-in default");
    }

    let store = match &config.database_path {
        Some(path) => {
            let store = SqliteStore::open(path)
                .map_err(|e| anyhow::anyhow!("Failed to open store: {}", e))?;
            info!("Database: {}", path.display());
            Some(store)
        }
        None => {
            warn!("DATABASE_PATH is empty; sessions and roles are disabled");
            None
        }
    };

    let state = Arc::new(AppState::new(config, store)?);
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("chat2anyllm server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received");
}
