//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the `/health` and `/scrape` handlers
//! - Wire up middleware (tracing, request ID)
//! - Bound each scrape by the request timeout
//! - Close the fetcher once serving stops

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::fetch::Fetcher;
use crate::http::response::{error_response, health_response};
use crate::observability::metrics;
use crate::orchestrator::{Orchestrator, ScrapeError, ScrapeStatus};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub request_timeout: Duration,
}

/// HTTP server for the scraping front-end.
pub struct HttpServer {
    router: Router,
    fetcher: Arc<Fetcher>,
    config: AppConfig,
}

impl HttpServer {
    pub fn new(config: AppConfig) -> Self {
        let fetcher = Arc::new(Fetcher::new(config.fetcher.clone()));
        let orchestrator = Arc::new(Orchestrator::from_config(Arc::clone(&fetcher), &config.scraping));

        let state = AppState {
            orchestrator,
            request_timeout: config.scraping.request_timeout(),
        };

        Self {
            router: Self::build_router(state),
            fetcher,
            config,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/scrape", get(scrape_handler))
            .with_state(state)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Router clone for in-process requests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn fetcher(&self) -> &Arc<Fetcher> {
        &self.fetcher
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Serve until `shutdown` resolves, then close the fetcher.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            processing_address = %self.config.scraping.processing_address,
            max_concurrent_fetches = self.fetcher.max_concurrent(),
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        self.fetcher.close().await;
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn health_handler() -> Response {
    health_response()
}

#[derive(Debug, Deserialize)]
struct ScrapeParams {
    url: Option<String>,
}

async fn scrape_handler(
    State(state): State<AppState>,
    params: Result<Query<ScrapeParams>, QueryRejection>,
) -> Response {
    let start = Instant::now();

    let params = match params {
        Ok(Query(params)) => params,
        Err(rejection) => {
            metrics::record_scrape("bad_request", start);
            tracing::debug!(error = %rejection.body_text(), "Unparseable query string");
            return error_response(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    let Some(url) = params.url.filter(|u| !u.trim().is_empty()) else {
        metrics::record_scrape("bad_request", start);
        return error_response(StatusCode::BAD_REQUEST, ScrapeError::MissingUrl.to_string());
    };

    tracing::info!(url = %url, "Scrape requested");
    let orchestrator = Arc::clone(&state.orchestrator);
    let task = tokio::spawn(async move { orchestrator.scrape(&url).await });
    let abort = task.abort_handle();

    match tokio::time::timeout(state.request_timeout, task).await {
        Ok(Ok(Ok(result))) => {
            let status = match result.status {
                ScrapeStatus::Success => "success",
                ScrapeStatus::Error => "error",
            };
            metrics::record_scrape(status, start);
            tracing::info!(
                url = %result.url,
                status,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Scrape finished"
            );
            Json(result).into_response()
        }
        Ok(Ok(Err(e))) => {
            metrics::record_scrape("bad_request", start);
            tracing::debug!(error = ?e, "Rejected scrape request");
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
        Ok(Err(join_error)) => {
            metrics::record_scrape("internal_error", start);
            tracing::error!(error = %join_error, "Scrape task failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Internal error: {}", join_error),
            )
        }
        Err(_) => {
            abort.abort();
            metrics::record_scrape("timeout", start);
            tracing::warn!(
                timeout_secs = state.request_timeout.as_secs(),
                "Scrape timed out"
            );
            error_response(StatusCode::GATEWAY_TIMEOUT, "Request timeout")
        }
    }
}
