use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use super::JobStatus;
use crate::db::tasks::TaskRecord;

#[derive(Debug, Serialize, ToSchema)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub status: String,
    pub docs: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Stato dell'API: `ok` oppure `degraded`
    pub status: String,
    /// Versione dell'API
    pub version: String,
    /// Flag di readiness dei sottosistemi
    pub database_ready: bool,
    pub queue_ready: bool,
}

/// Esito del probe verso il database
#[derive(Debug, Serialize, ToSchema)]
pub struct DbHealthResponse {
    pub status: String,
    pub database: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Esito del probe verso il broker Redis
#[derive(Debug, Serialize, ToSchema)]
pub struct RedisHealthResponse {
    pub status: String,
    pub redis: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TaskCreatedResponse {
    pub task_id: String,
    /// Identificativo del job assegnato dal broker
    pub job_id: String,
    pub status: JobStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TaskStatusResponse {
    pub task: TaskRecord,
    /// Stato del job letto fresco dal broker
    pub job_status: JobStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TaskResultResponse {
    pub task_id: String,
    pub result: Value,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub status: u16,
}
