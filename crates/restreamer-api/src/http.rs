//! reqwest-backed [`RestreamerApi`] implementation.
//!
//! Authentication uses the Restreamer JWT login (`POST /api/login`). Tokens are
//! refreshed lazily when they expire or when the server answers 401. Failed
//! logins back off exponentially so a wrong password does not hammer the server.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use url::Url;

use crate::client::RestreamerApi;
use crate::error::{ApiError, Result};
use crate::types::{
    EncodingParams, LoginResponse, OutputList, ProcessDetail, ProcessOutputSpec, ProcessSpec,
    ProcessSummary,
};

const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;
const INITIAL_LOGIN_BACKOFF: Duration = Duration::from_secs(1);
const MAX_LOGIN_RETRIES: u32 = 5;

fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Connection settings for a Restreamer instance.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub use_https: bool,
    pub timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
            username: None,
            password: None,
            use_https: false,
            timeout: Duration::from_secs(10),
        }
    }
}

impl ConnectionConfig {
    pub fn base_url(&self) -> Result<Url> {
        let scheme = if self.use_https { "https" } else { "http" };
        Ok(Url::parse(&format!("{}://{}:{}/", scheme, self.host, self.port))?)
    }
}

#[derive(Debug)]
struct AuthState {
    access_token: Option<String>,
    expires_at: i64,
    login_failures: u32,
    backoff: Duration,
    last_attempt: Option<Instant>,
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            access_token: None,
            expires_at: 0,
            login_failures: 0,
            backoff: INITIAL_LOGIN_BACKOFF,
            last_attempt: None,
        }
    }
}

impl AuthState {
    fn valid_token(&self) -> Option<&str> {
        if Utc::now().timestamp() >= self.expires_at {
            return None;
        }
        self.access_token.as_deref()
    }

    fn throttled_for(&self) -> Option<Duration> {
        if self.login_failures == 0 {
            return None;
        }
        let elapsed = self.last_attempt?.elapsed();
        (elapsed < self.backoff).then(|| self.backoff - elapsed)
    }

    fn record_failure(&mut self) {
        self.login_failures += 1;
        self.last_attempt = Some(Instant::now());
        if self.login_failures < MAX_LOGIN_RETRIES {
            self.backoff *= 2;
            warn!(
                attempt = self.login_failures,
                max = MAX_LOGIN_RETRIES,
                backoff_ms = self.backoff.as_millis() as u64,
                "Restreamer login failed, backing off"
            );
        } else {
            warn!(attempts = MAX_LOGIN_RETRIES, "Restreamer login keeps failing");
        }
    }

    fn invalidate(&mut self) {
        self.access_token = None;
        self.expires_at = 0;
    }
}

/// HTTP client for the Restreamer v3 API.
pub struct HttpRestreamerClient {
    client: reqwest::Client,
    base_url: Url,
    config: ConnectionConfig,
    auth: tokio::sync::Mutex<AuthState>,
    last_error: Mutex<Option<String>>,
}

impl std::fmt::Debug for HttpRestreamerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRestreamerClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl HttpRestreamerClient {
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        install_rustls_provider();

        let base_url = config.base_url()?;
        let mut builder = reqwest::Client::builder();
        if config.timeout > Duration::ZERO {
            builder = builder.timeout(config.timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            base_url,
            config,
            auth: tokio::sync::Mutex::new(AuthState::default()),
            last_error: Mutex::new(None),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ========== Authentication ==========

    async fn access_token(&self) -> Result<String> {
        let mut auth = self.auth.lock().await;
        if let Some(token) = auth.valid_token() {
            return Ok(token.to_string());
        }
        self.login(&mut auth).await
    }

    async fn login(&self, auth: &mut AuthState) -> Result<String> {
        let (Some(username), Some(password)) =
            (self.config.username.as_deref(), self.config.password.as_deref())
        else {
            return Err(ApiError::Auth(
                "Username and password required for login".to_string(),
            ));
        };

        if let Some(wait) = auth.throttled_for() {
            return Err(ApiError::Auth(format!(
                "Login throttled, retry in {} seconds",
                wait.as_secs().max(1)
            )));
        }

        let url = self.base_url.join("api/login")?;
        let response = match self
            .client
            .post(url)
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                auth.record_failure();
                return Err(e.into());
            }
        };

        let status = response.status();
        if !status.is_success() {
            auth.record_failure();
            return Err(ApiError::Auth(format!(
                "Login failed: HTTP {}",
                status.as_u16()
            )));
        }

        let body: LoginResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                auth.record_failure();
                return Err(e.into());
            }
        };
        let Some(token) = body.access_token else {
            auth.record_failure();
            return Err(ApiError::Auth(
                "No access token in login response".to_string(),
            ));
        };

        auth.access_token = Some(token.clone());
        auth.expires_at = body
            .expires_at
            .unwrap_or_else(|| Utc::now().timestamp() + DEFAULT_TOKEN_LIFETIME_SECS);
        auth.login_failures = 0;
        auth.backoff = INITIAL_LOGIN_BACKOFF;
        auth.last_attempt = None;

        info!(host = %self.config.host, "Logged in to Restreamer");
        Ok(token)
    }

    // ========== Requests ==========

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response> {
        let url = self.base_url.join(path)?;

        // One retry after a 401 with a fresh token.
        for attempt in 0..2 {
            let token = self.access_token().await?;
            let mut request = self
                .client
                .request(method.clone(), url.clone())
                .bearer_auth(token);
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request.send().await?;
            let status = response.status();
            if status == StatusCode::UNAUTHORIZED && attempt == 0 {
                debug!(path, "Restreamer token rejected, logging in again");
                self.auth.lock().await.invalidate();
                continue;
            }
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(ApiError::status(status.as_u16(), message));
            }
            return Ok(response);
        }

        Err(ApiError::Auth("Restreamer rejected refreshed token".to_string()))
    }

    async fn send_json<T: DeserializeOwned>(&self, method: Method, path: &str) -> Result<T> {
        let response = self.send(method, path, None).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn record<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            *self.last_error.lock() = Some(e.to_string());
        }
        result
    }

    async fn command(&self, process_id: &str, command: &str) -> Result<()> {
        let path = format!("api/v3/process/{}/command", process_id);
        self.send(Method::POST, &path, Some(&json!({ "command": command })))
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl RestreamerApi for HttpRestreamerClient {
    async fn create_process(&self, spec: &ProcessSpec) -> Result<String> {
        if spec.outputs.is_empty() {
            return self.record(Err(ApiError::other("No outputs for process")));
        }
        let body = json!({
            "reference": spec.reference,
            "command": spec.to_command(),
            "autostart": true,
        });
        let result = self
            .send(Method::POST, "api/v3/process", Some(&body))
            .await
            .map(|_| spec.reference.clone());
        self.record(result)
    }

    async fn stop_process(&self, process_id: &str) -> Result<()> {
        let result = self.command(process_id, "stop").await;
        self.record(result)
    }

    async fn delete_process(&self, process_id: &str) -> Result<()> {
        let path = format!("api/v3/process/{}", process_id);
        let result = self.send(Method::DELETE, &path, None).await.map(|_| ());
        self.record(result)
    }

    async fn list_processes(&self) -> Result<Vec<ProcessSummary>> {
        let result = self.send_json(Method::GET, "api/v3/process").await;
        self.record(result)
    }

    async fn get_process(&self, process_id: &str) -> Result<ProcessDetail> {
        let path = format!("api/v3/process/{}", process_id);
        let result = self.send_json(Method::GET, &path).await;
        self.record(result)
    }

    async fn list_process_outputs(&self, process_id: &str) -> Result<Vec<String>> {
        let path = format!("api/v3/process/{}/outputs", process_id);
        let result = self
            .send_json::<OutputList>(Method::GET, &path)
            .await
            .map(|list| list.outputs.into_iter().filter_map(|o| o.id).collect());
        self.record(result)
    }

    async fn add_process_output(
        &self,
        process_id: &str,
        output: &ProcessOutputSpec,
    ) -> Result<()> {
        let path = format!("api/v3/process/{}/outputs", process_id);
        let body = serde_json::to_value(output)?;
        let result = self.send(Method::POST, &path, Some(&body)).await.map(|_| ());
        self.record(result)
    }

    async fn remove_process_output(&self, process_id: &str, output_id: &str) -> Result<()> {
        let path = format!("api/v3/process/{}/outputs/{}", process_id, output_id);
        let result = self.send(Method::DELETE, &path, None).await.map(|_| ());
        self.record(result)
    }

    async fn update_output_encoding(
        &self,
        process_id: &str,
        output_id: &str,
        params: &EncodingParams,
    ) -> Result<()> {
        let path = format!(
            "api/v3/process/{}/outputs/{}/encoding",
            process_id, output_id
        );
        let body = serde_json::to_value(params)?;
        let result = self.send(Method::PUT, &path, Some(&body)).await.map(|_| ());
        self.record(result)
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }
}
