//! Connessione al database Postgres e schema

pub mod tasks;

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::Config;
use crate::services::pool::{ConnectError, LazyPool, PoolError};

pub type DbPool = PgPool;

/// Gestore del pool Postgres: creazione pigra con retry, probe per gli
/// health check, chiusura in fase di shutdown.
pub struct DatabaseManager {
    pool: LazyPool<DbPool>,
}

impl DatabaseManager {
    pub fn new(config: &Config) -> Self {
        let url = config.database_url.clone();
        let pool = LazyPool::new(
            "database",
            config.connect_max_attempts,
            config.backoff(),
            move || {
                let url = url.clone();
                async move { establish(&url).await }
            },
        );
        Self { pool }
    }

    /// Ottieni il pool condiviso, creandolo al primo uso
    pub async fn get(&self) -> Result<DbPool, PoolError> {
        self.pool.get().await
    }

    /// Flag di readiness letto dagli health check
    pub fn is_ready(&self) -> bool {
        self.pool.is_ready()
    }

    /// Round-trip minimo verso il database
    pub async fn probe(&self) -> Result<(), String> {
        let pool = self.get().await.map_err(|e| e.to_string())?;
        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Chiude il pool. No-op se non è mai stato creato.
    pub async fn close(&self) {
        if let Some(pool) = self.pool.take() {
            pool.close().await;
            tracing::info!("Pool database chiuso");
        }
    }
}

async fn establish(url: &str) -> Result<DbPool, ConnectError> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(5))
        .connect(url)
        .await
        .map_err(classify_error)?;

    // Verifica la connessione e allinea lo schema
    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .map_err(classify_error)?;
    run_migrations(&pool).await.map_err(classify_error)?;

    Ok(pool)
}

/// Classifica gli errori sqlx: configurazione e credenziali non vanno
/// ritentate, I/O e timeout sì
fn classify_error(e: sqlx::Error) -> ConnectError {
    match &e {
        sqlx::Error::Configuration(_) | sqlx::Error::Tls(_) => ConnectError::Fatal(e.to_string()),
        sqlx::Error::Database(db) => {
            // 28000/28P01: autenticazione rifiutata; 3D000: database inesistente
            let code = db.code();
            match code.as_deref() {
                Some("28000") | Some("28P01") | Some("3D000") => {
                    ConnectError::Fatal(e.to_string())
                }
                _ => ConnectError::Transient(e.to_string()),
            }
        }
        _ => ConnectError::Transient(e.to_string()),
    }
}

/// Esegue le migrazioni del database
async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    // Crea tabella tasks
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            id TEXT PRIMARY KEY,
            source_url TEXT NOT NULL,
            font_size INTEGER,
            job_id TEXT,
            status TEXT NOT NULL DEFAULT 'pending',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Crea tabella clips (popolata dai worker)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS clips (
            id TEXT PRIMARY KEY,
            task_id TEXT NOT NULL REFERENCES tasks(id),
            clip_index INTEGER NOT NULL,
            start_seconds DOUBLE PRECISION,
            end_seconds DOUBLE PRECISION,
            file_path TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Indici per le letture frequenti
    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_tasks_created_at ON tasks(created_at)"#)
        .execute(pool)
        .await?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_clips_task ON clips(task_id)"#)
        .execute(pool)
        .await?;

    Ok(())
}
