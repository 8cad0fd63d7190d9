use anyhow::Context;
use stakesync::ledger::{CallInterface, JsonRpcLedger};
use stakesync::orchestration::{Session, SessionHandle, StakingEngine};
use stakesync::{api, config::Config, db::init_db, Repository};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = Config::from_env().context("Configuration error")?;
    let port = config.port;

    let pool = init_db(&config.database_path)
        .await
        .context("Failed to initialize database")?;
    let repo = Arc::new(Repository::new(pool));

    let ledger: Arc<dyn CallInterface> = Arc::new(JsonRpcLedger::new(
        config.rpc_url.clone(),
        config.staking_contract.clone(),
    ));
    let session = SessionHandle::new(match &config.account {
        Some(account) => Session::connected(account.clone()),
        None => Session::disconnected(),
    });

    let engine = Arc::new(StakingEngine::new(ledger, repo.clone(), session, &config));
    engine.start();

    let app = api::create_router(api::AppState::new(engine.clone(), repo, config));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    engine.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
