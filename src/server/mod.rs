//! HTTP server: shared state, router, and startup.
//!
//! Handlers live in [`routes`]. Database work is synchronous and runs on the
//! blocking pool behind a single shared connection.

pub mod error;
pub mod routes;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use axum::http::{header, Method};
use axum::Router;
use rusqlite::Connection;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::chat::provider::{ChatCompleter, LlmClient};
use crate::config::MatrixConfig;
use crate::db;
use crate::proxy;
pub use error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: Arc<MatrixConfig>,
    /// Client for the image and album proxies; it does not follow redirects
    /// on its own.
    pub http: reqwest::Client,
    pub llm: Arc<dyn ChatCompleter>,
}

impl AppState {
    /// State with a live provider client reading keys from the environment.
    pub fn new(conn: Connection, config: MatrixConfig) -> Result<Self> {
        let llm = Arc::new(LlmClient::from_env(build_http_client(&config)?, &config.chat));
        let http = proxy::build_client(Duration::from_secs(config.chat.timeout_secs))
            .context("failed to build proxy client")?;
        Ok(Self::with_completer(conn, config, http, llm))
    }

    pub fn with_completer(
        conn: Connection,
        config: MatrixConfig,
        http: reqwest::Client,
        llm: Arc<dyn ChatCompleter>,
    ) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            config: Arc::new(config),
            http,
            llm,
        }
    }

    /// Run `f` against the database on the blocking pool.
    pub async fn with_db<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let mut conn = db
                .lock()
                .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| ApiError::internal(format!("database task failed: {e}")))?
        .map_err(ApiError::from)
    }
}

pub fn build_http_client(config: &MatrixConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.chat.timeout_secs))
        .user_agent(concat!("matrix/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")
}

fn build_cors(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    if origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        let parsed: Vec<_> = origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors.allow_origin(parsed)
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = build_cors(&state.config.server.cors_origins);
    routes::api_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Open the database and serve the API until ctrl-c.
pub async fn serve(config: MatrixConfig) -> Result<()> {
    let db_path = config.resolved_db_path();
    let conn = db::open_database(&db_path)?;
    tracing::info!(db = %db_path.display(), "database ready");

    let bind_addr = config.bind_addr();
    let state = AppState::new(conn, config)?;
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "matrix listening at http://{bind_addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down");
        })
        .await?;

    Ok(())
}
