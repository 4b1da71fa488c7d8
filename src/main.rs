//! Talos — a personal-scale IndieAuth authorization server.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use talos::config::Config;
use talos::engine::AuthorizationEngine;
use talos::error::{Error, Result};
use talos::http::{build_router, AppState};
use talos::providers::ProviderRegistry;
use talos::repository::memory::{
    InMemoryAuthorizationCodeRepository, InMemoryPendingAuthenticationRepository, InMemoryRefreshTokenRepository,
};
use talos::ssrf;
use talos::token::TokenService;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "talos")]
#[command(about = "A personal-scale IndieAuth authorization server", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "TALOS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the authorization server
    Serve,

    /// Validate a configuration file without starting the server
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Check a configuration file for errors
    Validate {
        /// Configuration file to validate
        #[arg(value_name = "CONFIG")]
        config: PathBuf,
    },

    /// Print a starter configuration file to stdout
    Generate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => serve(cli.config).await,
        Commands::Config { action } => match action {
            ConfigCommands::Validate { config } => {
                init_tracing("info", "pretty");
                match Config::from_file(&config) {
                    Ok(_) => {
                        println!("configuration is valid");
                        Ok(())
                    }
                    Err(e) => {
                        eprintln!("configuration error: {e}");
                        std::process::exit(1);
                    }
                }
            }
            ConfigCommands::Generate => {
                print!("{}", include_str!("../config/talos.example.yaml"));
                Ok(())
            }
        },
    }
}

async fn serve(config_path: Option<PathBuf>) -> Result<()> {
    let path = config_path
        .or_else(Config::discover_path)
        .ok_or_else(|| Error::Config("no configuration file found; pass --config or create talos.yaml".to_string()))?;
    let config = Arc::new(Config::from_file(&path)?);

    init_tracing(&config.logging.level, &config.logging.format);
    info!(version = env!("CARGO_PKG_VERSION"), "talos starting");

    let token_service = TokenService::new(
        config.jwt.secret_key.as_bytes(),
        config.issuer(),
        chrono::Duration::minutes(config.jwt.access_token_ttl_minutes),
    )
    .map_err(|e| Error::Config(e.to_string()))?;

    let provider_registry = ProviderRegistry::from_credentials(&config.providers);
    if provider_registry.is_empty() {
        tracing::warn!("no identity providers configured; no profile will ever discover a sign-in option");
    }

    let http_client = ssrf::guarded_client("talos-indieauth/1", std::time::Duration::from_secs(10))
        .map_err(|e| Error::Internal(format!("failed to build HTTP client: {e}")))?;

    let pending_repo = Arc::new(InMemoryPendingAuthenticationRepository::default());
    let code_repo = Arc::new(InMemoryAuthorizationCodeRepository::default());
    let refresh_repo = Arc::new(InMemoryRefreshTokenRepository::default());

    let engine = Arc::new(AuthorizationEngine::new(
        config.clone(),
        token_service,
        provider_registry,
        http_client,
        pending_repo,
        code_repo,
        refresh_repo,
    ));

    spawn_cleanup_task(engine.clone());

    let state = AppState { engine, config: config.clone() };
    let router = build_router(state).layer(tower_http::trace::TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.host, config.port)
        .parse::<std::net::SocketAddr>()
        .map_err(|e| Error::Config(format!("invalid host/port: {e}")))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Internal(format!("failed to bind {addr}: {e}")))?;

    info!(%addr, "listening");

    axum::serve(listener, router.into_make_service_with_connect_info::<std::net::SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::Internal(format!("server error: {e}")))?;

    info!("talos stopped");
    Ok(())
}

fn spawn_cleanup_task(engine: Arc<AuthorizationEngine>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            interval.tick().await;
            let (sessions, codes, tokens) = engine.cleanup_expired().await;
            if sessions + codes + tokens > 0 {
                info!(sessions, codes, tokens, "swept expired records");
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}

fn init_tracing(level: &str, format: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    if format == "json" {
        if let Err(e) = registry.with(fmt::layer().json()).try_init() {
            error!("failed to initialize tracing: {e}");
        }
    } else if let Err(e) = registry.with(fmt::layer()).try_init() {
        error!("failed to initialize tracing: {e}");
    }
}
