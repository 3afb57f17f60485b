//! Endpoints per la creazione e l'interrogazione dei task

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::config::Config;
use crate::db::tasks::{self as db_tasks, ClipRecord, TaskRecord};
use crate::db::DatabaseManager;
use crate::error::{AppError, Result};
use crate::models::{JobStatus, TaskCreatedResponse, TaskResultResponse, TaskStatusResponse};
use crate::services::queue::JobQueue;
use crate::utils::{validate_font_size, validate_source_url};

#[derive(Clone)]
pub struct TasksState {
    pub db: Arc<DatabaseManager>,
    pub queue: Arc<JobQueue>,
    pub config: Config,
}

/// Richiesta di creazione task
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTaskRequest {
    /// URL del video sorgente (solo domini YouTube)
    pub source_url: String,
    /// Dimensione font dei sottotitoli (10-100)
    #[serde(default)]
    pub font_size: Option<i32>,
}

/// Query per la lista task
#[derive(Debug, Deserialize)]
pub struct TasksQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

pub fn router(db: Arc<DatabaseManager>, queue: Arc<JobQueue>, config: Config) -> Router {
    let state = TasksState { db, queue, config };
    Router::new()
        .route("/api/v1/tasks", post(create_task).get(list_tasks))
        .route("/api/v1/tasks/:id", get(get_task_status))
        .route("/api/v1/tasks/:id/result", get(get_task_result))
        .route("/api/v1/tasks/:id/clips", get(list_task_clips))
        .with_state(state)
}

/// Crea un task e accoda il job di elaborazione
#[utoipa::path(
    post,
    path = "/api/v1/tasks",
    request_body = CreateTaskRequest,
    responses(
        (status = 201, description = "Task creato e job accodato", body = TaskCreatedResponse),
        (status = 400, description = "Input non valido", body = crate::models::ErrorResponse),
        (status = 503, description = "Backend non raggiungibile", body = crate::models::ErrorResponse),
    ),
    tag = "Tasks"
)]
pub async fn create_task(
    State(state): State<TasksState>,
    Json(request): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<TaskCreatedResponse>)> {
    validate_source_url(&request.source_url)?;
    if let Some(size) = request.font_size {
        validate_font_size(size)?;
    }

    // Su un sottosistema degradato questo get() innesca la riconnessione
    // pigra; a tentativi esauriti il chiamante riceve 503
    let pool = state.db.get().await?;

    let task = TaskRecord::new(&request.source_url, request.font_size);
    db_tasks::create_task(&pool, &task)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    // I limiti di elaborazione viaggiano nella busta: li applica il worker
    let job_id = state
        .queue
        .enqueue(
            "process_video",
            json!({
                "task_id": task.id,
                "source_url": task.source_url,
                "font_size": task.font_size,
                "max_video_duration": state.config.max_video_duration,
                "max_clips": state.config.max_clips,
                "clip_duration": state.config.clip_duration,
            }),
        )
        .await?;

    db_tasks::set_task_job(&pool, &task.id, &job_id)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    tracing::info!(task_id = %task.id, job_id = %job_id, "Task creato");

    Ok((
        StatusCode::CREATED,
        Json(TaskCreatedResponse {
            task_id: task.id,
            job_id,
            status: JobStatus::Queued,
        }),
    ))
}

/// Lista dei task più recenti
#[utoipa::path(
    get,
    path = "/api/v1/tasks",
    params(
        ("limit" = Option<i64>, Query, description = "Limite risultati (default 50)"),
    ),
    responses(
        (status = 200, description = "Lista task", body = Vec<TaskRecord>),
    ),
    tag = "Tasks"
)]
pub async fn list_tasks(
    State(state): State<TasksState>,
    Query(query): Query<TasksQuery>,
) -> Result<Json<Vec<TaskRecord>>> {
    let pool = state.db.get().await?;
    let tasks = db_tasks::list_recent_tasks(&pool, query.limit)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(Json(tasks))
}

/// Stato del task con lettura fresca dello stato job dal broker
#[utoipa::path(
    get,
    path = "/api/v1/tasks/{id}",
    params(
        ("id" = String, Path, description = "Identificativo del task"),
    ),
    responses(
        (status = 200, description = "Stato del task", body = TaskStatusResponse),
        (status = 404, description = "Task inesistente", body = crate::models::ErrorResponse),
    ),
    tag = "Tasks"
)]
pub async fn get_task_status(
    State(state): State<TasksState>,
    Path(id): Path<String>,
) -> Result<Json<TaskStatusResponse>> {
    let pool = state.db.get().await?;
    let task = db_tasks::get_task(&pool, &id)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::TaskNotFound(id.clone()))?;

    // not-found dal broker è un esito legittimo (job mai partito o scaduto
    // dalla retention), non un errore
    let job_status = match &task.job_id {
        Some(job_id) => state.queue.status(job_id).await?,
        None => JobStatus::NotFound,
    };

    Ok(Json(TaskStatusResponse { task, job_status }))
}

/// Risultato dell'elaborazione, disponibile solo a job completato
#[utoipa::path(
    get,
    path = "/api/v1/tasks/{id}/result",
    params(
        ("id" = String, Path, description = "Identificativo del task"),
    ),
    responses(
        (status = 200, description = "Risultato dell'elaborazione", body = TaskResultResponse),
        (status = 202, description = "Elaborazione non ancora completata", body = crate::models::ErrorResponse),
        (status = 404, description = "Task inesistente", body = crate::models::ErrorResponse),
    ),
    tag = "Tasks"
)]
pub async fn get_task_result(
    State(state): State<TasksState>,
    Path(id): Path<String>,
) -> Result<Json<TaskResultResponse>> {
    let pool = state.db.get().await?;
    let task = db_tasks::get_task(&pool, &id)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::TaskNotFound(id.clone()))?;

    let job_id = task.job_id.as_deref().ok_or(AppError::ResultNotReady)?;
    let result = state
        .queue
        .result(job_id)
        .await?
        .ok_or(AppError::ResultNotReady)?;

    Ok(Json(TaskResultResponse {
        task_id: task.id,
        result,
    }))
}

/// Clip generate per il task
#[utoipa::path(
    get,
    path = "/api/v1/tasks/{id}/clips",
    params(
        ("id" = String, Path, description = "Identificativo del task"),
    ),
    responses(
        (status = 200, description = "Clip del task", body = Vec<ClipRecord>),
        (status = 404, description = "Task inesistente", body = crate::models::ErrorResponse),
    ),
    tag = "Tasks"
)]
pub async fn list_task_clips(
    State(state): State<TasksState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ClipRecord>>> {
    let pool = state.db.get().await?;
    db_tasks::get_task(&pool, &id)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::TaskNotFound(id.clone()))?;

    let clips = db_tasks::list_clips_for_task(&pool, &id)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(Json(clips))
}
