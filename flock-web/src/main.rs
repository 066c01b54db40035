//! flock-web - livestock record keeping service
//!
//! Serves the JSON API for breeds, sheep, breeding, lambing and health
//! records, plus uploaded images under /media.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use flock_common::auth::load_shared_secret;
use flock_common::config::{resolve_root_folder, RootFolder, TomlConfig};
use flock_common::db::init_database;
use flock_common::db::settings::RuntimeSettings;
use flock_web::media::MediaStore;
use flock_web::{build_router, AppState};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for flock-web
#[derive(Parser, Debug)]
#[command(name = "flock-web")]
#[command(about = "Livestock record keeping service")]
#[command(version)]
struct Args {
    /// Folder holding flock.db and uploaded media
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, env = "FLOCK_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long, env = "FLOCK_PORT")]
    port: Option<u16>,

    /// Address to bind (overrides config)
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Loaded before tracing so the configured level applies from the start
    let (config, config_source) = TomlConfig::load_or_default(args.config.as_deref());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("flock_web={0},flock_common={0},tower_http=info", config.logging.level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting flock-web v{}", env!("CARGO_PKG_VERSION"));
    config_source.log();

    let root = RootFolder::new(resolve_root_folder(args.root_folder.as_deref(), &config))
        .with_database_path(config.database_path.clone());
    root.ensure_directories()
        .with_context(|| format!("Failed to create root folder {}", root.path().display()))?;
    info!("Root folder: {}", root.path().display());

    let db_path = root.database_path();
    info!("Database path: {}", db_path.display());
    let pool = init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    let shared_secret = load_shared_secret(&pool)
        .await
        .context("Failed to load API shared secret")?;
    if shared_secret == 0 {
        info!("Request signing disabled (api_shared_secret = 0)");
    } else {
        info!("Loaded shared secret for request signing");
    }

    let settings = RuntimeSettings::load(&pool).await.context("Failed to load settings")?;
    info!(
        "Settings: page size {}, recent limit {}, max upload {} bytes",
        settings.list_page_size, settings.detail_recent_limit, settings.max_upload_bytes
    );

    let state = AppState::new(pool, shared_secret, settings, MediaStore::new(root.media_path()));
    let app = build_router(state);

    let bind = args.bind.unwrap_or(config.bind_address);
    let port = args.port.unwrap_or(config.port);
    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", bind, port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("flock-web listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
