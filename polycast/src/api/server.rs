//! API server setup and configuration.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::api::routes;
use crate::channel::ChannelManager;
use crate::config::{AppConfig, DEFAULT_API_PORT};
use crate::error::{Error, Result};
use crate::persistence::SettingsStore;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub enable_cors: bool,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: DEFAULT_API_PORT,
            enable_cors: true,
        }
    }
}

impl From<&AppConfig> for ApiServerConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            bind_address: config.api_bind_address.clone(),
            port: config.api_port,
            ..Default::default()
        }
    }
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<Mutex<ChannelManager>>,
    /// Where mutations are persisted; `None` keeps everything in memory.
    pub store: Option<Arc<dyn SettingsStore>>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(manager: Arc<Mutex<ChannelManager>>) -> Self {
        Self {
            manager,
            store: None,
            start_time: Instant::now(),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Save the manager's settings document. A failed save is logged and
    /// does not fail the request that caused it.
    pub async fn persist(&self, manager: &ChannelManager) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store.save(&manager.save_to_settings()).await {
            warn!(error = %e, "Failed to persist settings");
        }
    }
}

/// API server.
pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
    cancel_token: CancellationToken,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig, state: AppState) -> Self {
        Self::with_cancel_token(config, state, CancellationToken::new())
    }

    /// Share a shutdown token with the rest of the daemon.
    pub fn with_cancel_token(
        config: ApiServerConfig,
        state: AppState,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            config,
            state,
            cancel_token,
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Build the router with all middleware and routes.
    pub fn build_router(&self) -> Router {
        let mut router = routes::create_router(self.state.clone());

        if self.config.enable_cors {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any);
            router = router.layer(cors);
        }

        router.layer(TraceLayer::new_for_http())
    }

    /// Serve until the cancel token fires.
    pub async fn run(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.port)
            .parse()
            .map_err(|e| Error::config(format!("Invalid address: {}", e)))?;

        let router = self.build_router();
        let listener = TcpListener::bind(addr).await?;

        info!("API server listening on http://{}", addr);

        let cancel_token = self.cancel_token.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                info!("API server shutting down...");
            })
            .await?;

        Ok(())
    }

    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ApiServerConfig::default();
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.port, 12556);
        assert!(config.enable_cors);
    }

    #[test]
    fn test_config_from_app_config() {
        let app = AppConfig {
            api_bind_address: "127.0.0.1".to_string(),
            api_port: 9000,
            ..Default::default()
        };
        let config = ApiServerConfig::from(&app);
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn test_server_shutdown_cancels_token() {
        let manager = Arc::new(Mutex::new(ChannelManager::new(None)));
        let server = ApiServer::new(ApiServerConfig::default(), AppState::new(manager));
        let token = server.cancel_token();
        assert!(!token.is_cancelled());
        server.shutdown();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_persist_without_store_is_noop() {
        let manager = Arc::new(Mutex::new(ChannelManager::new(None)));
        let state = AppState::new(manager.clone());
        state.persist(&*manager.lock().await).await;
    }
}
