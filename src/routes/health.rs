use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};

use crate::db::DatabaseManager;
use crate::models::{DbHealthResponse, HealthResponse, RedisHealthResponse, ServiceInfo};
use crate::services::queue::BrokerPool;

#[derive(Clone)]
pub struct HealthState {
    pub db: Arc<DatabaseManager>,
    pub broker: Arc<BrokerPool>,
}

pub fn router(db: Arc<DatabaseManager>, broker: Arc<BrokerPool>) -> Router {
    let state = HealthState { db, broker };
    Router::new()
        .route("/", get(service_info))
        .route("/health", get(health_check))
        .route("/health/db", get(health_db))
        .route("/health/redis", get(health_redis))
        .with_state(state)
}

/// Informazioni sul servizio
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Informazioni servizio", body = ServiceInfo),
    ),
    tag = "Sistema"
)]
pub async fn service_info() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: "Clipflow API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "running".to_string(),
        docs: "/swagger-ui".to_string(),
    })
}

/// Health check dell'API con i flag di readiness dei sottosistemi.
///
/// Legge solo lo stato corrente, senza round-trip verso i backend.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "API funzionante", body = HealthResponse),
    ),
    tag = "Sistema"
)]
pub async fn health_check(State(state): State<HealthState>) -> Json<HealthResponse> {
    let database_ready = state.db.is_ready();
    let queue_ready = state.broker.is_ready();
    let status = if database_ready && queue_ready {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database_ready,
        queue_ready,
    })
}

/// Verifica la connessione al database.
///
/// Probe vivo: su un sottosistema degradato innesca la stessa
/// riconnessione pigra di un normale accesso, niente di più.
#[utoipa::path(
    get,
    path = "/health/db",
    responses(
        (status = 200, description = "Database raggiungibile", body = DbHealthResponse),
        (status = 503, description = "Database non raggiungibile", body = DbHealthResponse),
    ),
    tag = "Sistema"
)]
pub async fn health_db(State(state): State<HealthState>) -> (StatusCode, Json<DbHealthResponse>) {
    match state.db.probe().await {
        Ok(()) => (
            StatusCode::OK,
            Json(DbHealthResponse {
                status: "healthy".to_string(),
                database: "connected".to_string(),
                error: None,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(DbHealthResponse {
                status: "unhealthy".to_string(),
                database: "disconnected".to_string(),
                error: Some(e),
            }),
        ),
    }
}

/// Verifica la connessione al broker Redis
#[utoipa::path(
    get,
    path = "/health/redis",
    responses(
        (status = 200, description = "Broker raggiungibile", body = RedisHealthResponse),
        (status = 503, description = "Broker non raggiungibile", body = RedisHealthResponse),
    ),
    tag = "Sistema"
)]
pub async fn health_redis(
    State(state): State<HealthState>,
) -> (StatusCode, Json<RedisHealthResponse>) {
    match state.broker.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(RedisHealthResponse {
                status: "healthy".to_string(),
                redis: "connected".to_string(),
                error: None,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(RedisHealthResponse {
                status: "unhealthy".to_string(),
                redis: "disconnected".to_string(),
                error: Some(e),
            }),
        ),
    }
}
