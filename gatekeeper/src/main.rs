//! gatekeeper entrypoint: resolve bootstrap configuration, bring up the
//! Task Store, recover interrupted work, spawn the detect/upload worker
//! pools, and serve the External API Adapter.

use clap::Parser;
use gatekeeper::media::external::ExternalMediaToolkit;
use gatekeeper::queue::{detect_worker, upload_worker, Running, TaskQueue};
use gatekeeper::transcriber::TwoTierTranscriber;
use gatekeeper::{api, db, supervisor, AppState};
use gatekeeper_common::bootstrap::{Cli, Config};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive("gatekeeper=info".parse()?))
        .init();

    let cfg = Config::resolve(Cli::parse())?;
    info!(listen_host = %cfg.listen_host, listen_port = cfg.listen_port, "starting gatekeeper");

    let pool = db::init_database_pool(&cfg.db_path).await?;

    let detect_queue = TaskQueue::new();
    let upload_queue = TaskQueue::new();
    let running = Running::new();

    let (detect_recovered, upload_recovered) = supervisor::recover_interrupted(&pool, &detect_queue, &upload_queue).await?;
    info!(detect_recovered, upload_recovered, "startup recovery complete");

    let toolkit: Arc<dyn gatekeeper::media::MediaToolkit> =
        Arc::new(ExternalMediaToolkit::new(cfg.probe_tool.clone(), cfg.upload_tool.clone()));
    let transcriber: Arc<dyn gatekeeper::transcriber::Transcriber> = Arc::new(TwoTierTranscriber::new());
    let notify_client = reqwest::Client::new();

    let bootstrap_cfg = supervisor::resolve_settings(&pool, &gatekeeper::models::Overrides::new()).await?;

    for _ in 0..bootstrap_cfg.concurrency_detect as usize {
        tokio::spawn(detect_worker::run(
            pool.clone(),
            detect_queue.clone(),
            upload_queue.clone(),
            running.clone(),
            toolkit.clone(),
            transcriber.clone(),
            notify_client.clone(),
        ));
    }

    for _ in 0..bootstrap_cfg.concurrency_upload as usize {
        tokio::spawn(upload_worker::run(
            pool.clone(),
            upload_queue.clone(),
            running.clone(),
            toolkit.clone(),
            notify_client.clone(),
            cfg.scan_path.clone(),
        ));
    }

    let state = AppState {
        db: pool,
        detect_queue,
        upload_queue,
        running,
        toolkit,
        transcriber,
        notify_client,
        scan_root: cfg.scan_path.clone(),
        api_token: cfg.api_token.clone(),
        started_at: chrono::Utc::now(),
    };

    let router = api::build_router(state).layer(tower_http::trace::TraceLayer::new_for_http());

    let addr = format!("{}:{}", cfg.listen_host, cfg.listen_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
