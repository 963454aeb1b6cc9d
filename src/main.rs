mod canvas;
mod config;
mod error;
mod planner;
mod routes;
mod services;
mod state;
mod store;

use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use config::{Cli, Command, ConfigError, RenameConfig, Timing};
use services::pass::{self, PassError};
use services::scheduler;
use state::AppState;
use store::{DocumentStore, FsStore, StoreError};

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Pass(#[from] PassError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON output: {0}")]
    Json(#[from] serde_json::Error),
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Logs go to stderr so `plan` and `apply` output stays pipeable.
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let store = FsStore::new(&cli.vault_root);
    info!(root = %store.root().display(), "vault opened");
    let store: Arc<dyn DocumentStore> = Arc::new(store);

    match cli.command.clone().unwrap_or_default() {
        Command::Documents => run_documents(store.as_ref()).await,
        Command::Plan => run_plan(store.as_ref(), &rename_config(&cli)?).await,
        Command::Apply => run_apply(store.as_ref(), &rename_config(&cli)?).await,
        Command::Watch { port } => run_watch(store, rename_config(&cli)?, port).await,
    }
}

fn rename_config(cli: &Cli) -> Result<RenameConfig, ConfigError> {
    RenameConfig::new(cli.target.as_deref(), cli.prefix.as_deref())
}

async fn run_documents(store: &dyn DocumentStore) -> Result<(), AppError> {
    for path in store::canvas_documents(store).await? {
        println!("{path}");
    }
    Ok(())
}

async fn run_plan(store: &dyn DocumentStore, config: &RenameConfig) -> Result<(), AppError> {
    let plan = pass::preview(store, config).await?;
    if plan.is_empty() {
        info!(qualifying = plan.qualifying, "nothing to rename");
    }
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

async fn run_apply(store: &dyn DocumentStore, config: &RenameConfig) -> Result<(), AppError> {
    let timing = Timing::from_env();
    let reports = pass::apply_once(store, config, timing.retry_delay).await?;
    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}

async fn run_watch(store: Arc<dyn DocumentStore>, config: RenameConfig, port: u16) -> Result<(), AppError> {
    let timing = Timing::from_env();
    info!(canvas = %config.target, prefix = %config.prefix, "watching canvas");

    let (state, rx) = AppState::new(store, config, timing);
    let (stop_tx, stop_rx) = watch::channel(false);
    let worker = scheduler::spawn_worker(state.clone(), rx, stop_rx);
    let ticker = scheduler::spawn_ticker(state.clone());

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;

    info!(%port, "canvas-autorename listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    ticker.abort();
    // The worker finishes any pass in flight before it exits.
    let _ = stop_tx.send(true);
    if let Err(e) = worker.await {
        error!(error = %e, "rename worker failed");
    }
    info!("canvas-autorename stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c; running until killed");
        std::future::pending::<()>().await;
    }
}
