use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::pool::PoolError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Task non trovato: {0}")]
    TaskNotFound(String),

    #[error("Richiesta non valida: {0}")]
    BadRequest(String),

    #[error("URL sorgente non valido: {0}")]
    InvalidSourceUrl(String),

    #[error("Servizio temporaneamente non disponibile: {0}")]
    ServiceUnavailable(String),

    #[error("Errore broker: {0}")]
    Broker(String),

    #[error("Errore database: {0}")]
    Database(String),

    #[error("Risultato non ancora disponibile")]
    ResultNotReady,

    #[error("Errore interno: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::TaskNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::InvalidSourceUrl(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            AppError::Broker(_) => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            AppError::ResultNotReady => (StatusCode::ACCEPTED, self.to_string()),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<PoolError> for AppError {
    fn from(e: PoolError) -> Self {
        match e {
            // Budget esaurito: il chiamante riceve un 503 e decide se
            // ritentare, il processo non cade
            PoolError::Exhausted { .. } => AppError::ServiceUnavailable(e.to_string()),
            PoolError::Fatal { .. } => AppError::Internal(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
