use axum::{
    extract::{rejection::JsonRejection, Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::domain::TransactionId;
use crate::observability::{InFlightGuard, MetricsRegistry};
use crate::service::{PaymentProcessor, ProcessError};

use super::request::CreateTransactionRequest;
use super::response::{
    ConfigResponse, ErrorResponse, HealthResponse, ReadyResponse, StatsResponse,
};

/// Number of rows returned by the listing endpoints.
pub const RECENT_LIMIT: usize = 50;

/// Shared application state.
pub struct AppState {
    /// Payment pipeline and storage access
    pub processor: PaymentProcessor,

    /// Application metrics
    pub metrics: Arc<MetricsRegistry>,

    /// Effective settings served by `/api/config`
    pub config: ConfigResponse,

    /// Application start time
    pub start_time: Instant,

    /// Application version
    pub version: String,
}

/// Create the application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/api/transactions",
            get(handle_list_transactions).post(handle_create_transaction),
        )
        .route("/api/transactions/:id", get(handle_get_transaction))
        .route("/api/fraud/alerts", get(handle_list_alerts))
        .route("/api/stats", get(handle_stats))
        .route("/api/config", get(handle_config))
        .route("/health", get(handle_health))
        .route("/ready", get(handle_ready))
        .route("/metrics", get(handle_metrics))
        .layer(middleware::from_fn_with_state(state.clone(), track_in_flight))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn track_in_flight(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let _guard = InFlightGuard::new(&state.metrics);
    next.run(request).await
}

fn error_response(status: StatusCode, body: ErrorResponse) -> Response {
    (status, Json(body)).into_response()
}

fn storage_failure(context: &str, e: anyhow::Error) -> Response {
    error!(error = %e, "{}", context);
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        ErrorResponse::internal_error(context),
    )
}

/// Submit a payment.
async fn handle_create_transaction(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateTransactionRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => {
            state.metrics.record_invalid_request();
            warn!(error = %rejection.body_text(), "Rejected malformed transaction request");
            return error_response(
                StatusCode::BAD_REQUEST,
                ErrorResponse::bad_request(rejection.body_text()),
            );
        }
    };

    let result = match req.into_new_transaction() {
        Ok(new_tx) => state.processor.submit(new_tx).await,
        Err(e) => Err(ProcessError::from(e)),
    };

    match result {
        Ok(processed) => (StatusCode::CREATED, Json(processed)).into_response(),
        Err(ProcessError::InvalidTransaction(e)) => {
            state.metrics.record_invalid_request();
            warn!(error = %e, "Rejected invalid transaction");
            error_response(
                StatusCode::BAD_REQUEST,
                ErrorResponse::bad_request(e.to_string()),
            )
        }
        Err(ProcessError::Storage(_)) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorResponse::internal_error("failed to process transaction"),
        ),
    }
}

/// Most recent transactions, newest first.
async fn handle_list_transactions(State(state): State<Arc<AppState>>) -> Response {
    match state.processor.recent_transactions(RECENT_LIMIT).await {
        Ok(transactions) => Json(transactions).into_response(),
        Err(e) => storage_failure("failed to list transactions", e),
    }
}

/// One transaction with its alerts.
async fn handle_get_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let Some(id) = TransactionId::parse(&id) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            ErrorResponse::bad_request(format!("invalid transaction id: {}", id)),
        );
    };

    match state.processor.transaction_with_alerts(id).await {
        Ok(Some(details)) => Json(details).into_response(),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            ErrorResponse::not_found(format!("transaction {} not found", id)),
        ),
        Err(e) => storage_failure("failed to load transaction", e),
    }
}

/// Most recent fraud alerts, newest first.
async fn handle_list_alerts(State(state): State<Arc<AppState>>) -> Response {
    match state.processor.recent_alerts(RECENT_LIMIT).await {
        Ok(alerts) => Json(alerts).into_response(),
        Err(e) => storage_failure("failed to list fraud alerts", e),
    }
}

async fn handle_stats(State(state): State<Arc<AppState>>) -> Response {
    match state.processor.stats().await {
        Ok(stats) => Json(StatsResponse::from(stats)).into_response(),
        Err(e) => storage_failure("failed to compute stats", e),
    }
}

async fn handle_config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.config.clone())
}

/// Health check endpoint.
async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// Readiness check endpoint.
async fn handle_ready(State(state): State<Arc<AppState>>) -> Response {
    if let Err(e) = state.processor.storage().ping().await {
        warn!(error = %e, "Readiness check failed");
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            ErrorResponse::new("storage unavailable", "NOT_READY"),
        );
    }

    let evaluator = state.processor.evaluator();
    (
        StatusCode::OK,
        Json(ReadyResponse {
            ready: true,
            storage: state.config.storage.clone(),
            fraud_detection: evaluator.is_enabled(),
            rules: evaluator.rule_count(),
        }),
    )
        .into_response()
}

/// Metrics endpoint (Prometheus format).
async fn handle_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut metrics = state.metrics.to_prometheus();
    metrics.push_str(&format!(
        r#"
# HELP payflow_uptime_seconds Application uptime in seconds
# TYPE payflow_uptime_seconds counter
payflow_uptime_seconds {}
"#,
        state.start_time.elapsed().as_secs(),
    ));

    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics,
    )
}
