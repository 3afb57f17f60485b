//! Modulo per la gestione dei task nel database

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::DbPool;

/// Record task nel database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct TaskRecord {
    pub id: String,
    pub source_url: String,
    pub font_size: Option<i32>,
    /// Identificativo del job sul broker, valorizzato dopo l'accodamento
    pub job_id: Option<String>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl TaskRecord {
    pub fn new(source_url: &str, font_size: Option<i32>) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            source_url: source_url.to_string(),
            font_size,
            job_id: None,
            status: "pending".to_string(),
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// Crea un nuovo task nel database
pub async fn create_task(pool: &DbPool, task: &TaskRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO tasks (id, source_url, font_size, job_id, status, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(&task.id)
    .bind(&task.source_url)
    .bind(task.font_size)
    .bind(&task.job_id)
    .bind(&task.status)
    .bind(&task.created_at)
    .bind(&task.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Ottieni un task per id
pub async fn get_task(pool: &DbPool, id: &str) -> Result<Option<TaskRecord>, sqlx::Error> {
    sqlx::query_as::<_, TaskRecord>(r#"SELECT * FROM tasks WHERE id = $1"#)
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Registra l'identificativo del job assegnato dal broker
pub async fn set_task_job(pool: &DbPool, id: &str, job_id: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"UPDATE tasks SET job_id = $1, status = 'queued', updated_at = $2 WHERE id = $3"#,
    )
    .bind(job_id)
    .bind(Utc::now().to_rfc3339())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Lista dei task più recenti
pub async fn list_recent_tasks(pool: &DbPool, limit: i64) -> Result<Vec<TaskRecord>, sqlx::Error> {
    sqlx::query_as::<_, TaskRecord>(
        r#"SELECT * FROM tasks ORDER BY created_at DESC LIMIT $1"#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Record clip prodotto dai worker
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ClipRecord {
    pub id: String,
    pub task_id: String,
    pub clip_index: i32,
    pub start_seconds: Option<f64>,
    pub end_seconds: Option<f64>,
    pub file_path: Option<String>,
    pub created_at: String,
}

/// Clip generate per un task, in ordine di indice
pub async fn list_clips_for_task(
    pool: &DbPool,
    task_id: &str,
) -> Result<Vec<ClipRecord>, sqlx::Error> {
    sqlx::query_as::<_, ClipRecord>(
        r#"SELECT * FROM clips WHERE task_id = $1 ORDER BY clip_index"#,
    )
    .bind(task_id)
    .fetch_all(pool)
    .await
}
