pub mod api;
pub mod clients;
pub mod config;
pub mod db;
pub mod entities;
pub mod services;
pub mod state;

use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub use config::Config;
use state::SharedState;

pub async fn run() -> anyhow::Result<()> {
    let config = Config::load()?;
    config.validate()?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(String::as_str) {
        None | Some("serve") => run_server(config).await,

        Some("reset-db") => run_reset(config).await,

        Some("init") => {
            Config::create_default_if_missing()?;
            println!("✓ Config file created. Edit config.toml and run again.");
            Ok(())
        }

        Some("help" | "-h" | "--help") => {
            print_help();
            Ok(())
        }

        Some(other) => {
            println!("Unknown command: {other}");
            println!();
            print_help();
            Ok(())
        }
    }
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    let port = config.server.port;

    let shared = Arc::new(SharedState::new(config).await?);

    // Startup connectivity probe: log the outcome, keep serving either way.
    match shared.store.ping().await {
        Ok(()) => info!("Database probe ok"),
        Err(e) => warn!("Database probe failed: {e}"),
    }

    let state = api::create_app_state(shared).await;
    let app = api::router(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shut down cleanly");
    Ok(())
}

async fn run_reset(config: Config) -> anyhow::Result<()> {
    let store = db::Store::with_pool_options(
        &config.general.database_url,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await?;

    store
        .reset(&config.admin.login, &config.admin.password, &config.security)
        .await?;

    println!("✓ Schema recreated and admin account seeded.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}

fn print_help() {
    println!("Accountd - Account Management Service");
    println!();
    println!("USAGE:");
    println!("  accountd [COMMAND]");
    println!();
    println!("COMMANDS:");
    println!("  serve        Run the HTTP service (default)");
    println!("  reset-db     Drop and recreate the schema, reseed the admin account");
    println!("               (development reset - destroys all data)");
    println!("  init         Create default config file");
    println!("  help         Show this help message");
    println!();
    println!("CONFIG:");
    println!("  Edit config.toml to configure the database, admin bootstrap");
    println!("  credentials and the session-invalidation endpoint.");
}
