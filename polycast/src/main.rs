use std::sync::Arc;

use polycast::api::{ApiServer, ApiServerConfig, AppState};
use polycast::channel::ChannelManager;
use polycast::config::AppConfig;
use polycast::logging::init_logging;
use polycast::persistence::{JsonFileSettingsStore, SettingsStore};
use polycast::scheduler::{HealthScheduler, SchedulerConfig};
use restreamer_api::{HttpRestreamerClient, RestreamerApi};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    let _log_guard = init_logging(config.log_dir.as_deref())?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting polycast");

    let api: Option<Arc<dyn RestreamerApi>> = match config.restreamer_connection() {
        Some(connection) => {
            info!(host = %connection.host, port = connection.port, "Using Restreamer control plane");
            Some(Arc::new(HttpRestreamerClient::new(connection)?))
        }
        None => {
            warn!("RESTREAMER_USERNAME not set; channels cannot be started");
            None
        }
    };

    let mut manager = ChannelManager::new(api);
    let store: Arc<dyn SettingsStore> = Arc::new(JsonFileSettingsStore::new(config.settings_path.clone()));
    if let Some(document) = store.load().await? {
        let loaded = manager.load_from_settings(&document);
        info!(channels = loaded, path = %config.settings_path.display(), "Loaded settings");
    }

    let startup = manager.start_all().await;
    for failure in &startup.failed {
        warn!(channel_id = %failure.item, reason = %failure.reason, "Auto-start failed");
    }

    let manager = Arc::new(Mutex::new(manager));
    let cancel_token = CancellationToken::new();

    let scheduler = HealthScheduler::new(
        manager.clone(),
        SchedulerConfig {
            tick: config.scheduler_tick,
        },
        cancel_token.clone(),
    );
    let scheduler_handle = tokio::spawn(async move { scheduler.run().await });

    let state = AppState::new(manager.clone()).with_store(store.clone());
    let server = ApiServer::with_cancel_token(
        ApiServerConfig::from(&config),
        state,
        cancel_token.clone(),
    );
    let server_token = cancel_token.clone();
    let server_handle = tokio::spawn(async move {
        let result = server.run().await;
        server_token.cancel();
        result
    });

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown signal received");
        }
        _ = cancel_token.cancelled() => {}
    }
    cancel_token.cancel();

    if let Err(e) = scheduler_handle.await {
        warn!(error = %e, "Scheduler task ended abnormally");
    }
    match server_handle.await {
        Ok(Err(e)) => error!(error = %e, "API server failed"),
        Err(e) => warn!(error = %e, "API server task ended abnormally"),
        Ok(Ok(())) => {}
    }

    let mut manager = manager.lock().await;
    let report = manager.stop_all().await;
    if !report.is_success() {
        warn!(failed = report.failed.len(), "Some channels did not stop cleanly");
    }
    store.save(&manager.save_to_settings()).await?;

    info!("polycast stopped");
    Ok(())
}
