use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

mod app;
mod http;
mod token;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courier_gateway=info,tower_http=debug".into()),
        )
        .init();

    // load config: explicit COURIER_CONFIG env > ~/.courier/courier.toml
    let config_path = std::env::var("COURIER_CONFIG").ok();
    let config = courier_core::config::CourierConfig::load(config_path.as_deref())
        .unwrap_or_else(|e| {
            warn!("Config load failed ({}), using defaults", e);
            courier_core::config::CourierConfig::default()
        });

    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;

    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening SQLite database");

    let db = rusqlite::Connection::open(db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    let store = Arc::new(courier_store::JobStore::new(db)?);

    // platform connector; production MTProto drivers plug in here
    let connector: Arc<dyn courier_client::api::PlatformConnector> =
        match config.platform.driver.as_str() {
            "sandbox" => Arc::new(courier_client::sandbox::SandboxConnector::new()),
            other => anyhow::bail!("unknown platform driver: {other}"),
        };

    let registry =
        courier_client::registry::SessionRegistry::new(connector, config.sessions.dir.clone());
    let client = courier_client::actor::ClientActor::spawn(registry);

    // reopen sessions persisted by earlier runs
    let accounts = store.list_accounts()?;
    if !accounts.is_empty() {
        let creds: Vec<courier_client::types::Credentials> = accounts
            .into_iter()
            .map(|a| courier_client::types::Credentials {
                account: a.account,
                api_id: a.api_id,
                api_hash: a.api_hash,
            })
            .collect();
        let total = creds.len();
        match client.restore_all(creds).await {
            Ok(restored) => info!(restored, total, "session restore complete"),
            Err(e) => warn!(error = %e, "session restore failed"),
        }
    }

    let media = courier_media::MediaStaging::new(config.media.dir.clone());
    let dispatch =
        courier_dispatch::DispatchEngine::new(client.clone(), &config.dispatch);
    let executor = Arc::new(courier_scheduler::JobExecutor::new(
        Arc::clone(&store),
        dispatch,
        media.clone(),
    ));
    let engine = courier_scheduler::SchedulerEngine::new(
        Arc::clone(&store),
        Arc::clone(&executor),
        &config.scheduler,
    );

    let state = Arc::new(app::AppState::new(
        config,
        Arc::clone(&store),
        client.clone(),
        media,
        executor,
    ));
    let router = app::build_router(Arc::clone(&state));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    state.set_scheduler_running(true);
    tokio::spawn(async move { engine.run(shutdown_rx).await });

    let addr: SocketAddr = format!("{}:{}", bind, port).parse()?;
    info!("Courier gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // stop the scheduler, then close every live platform session
    let _ = shutdown_tx.send(true);
    state.set_scheduler_running(false);
    if let Err(e) = client.disconnect_all().await {
        warn!(error = %e, "disconnect on shutdown failed");
    }
    info!("Courier gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to install ctrl-c handler");
    }
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }
}
