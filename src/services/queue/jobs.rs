//! Invio e interrogazione dei job sul broker
//!
//! Il contratto con i worker: la busta JSON viene spinta su
//! `{coda}:pending`, lo stato vive nell'hash `{coda}:job:{id}` (campo
//! `status`, più `result` a completamento). I worker aggiornano l'hash e
//! gli applicano la retention, quindi una chiave assente significa job
//! sconosciuto oppure scaduto.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use super::broker::BrokerPool;
use crate::error::{AppError, Result};
use crate::models::{JobEnvelope, JobStatus};

/// Coda job costruita sopra il pool del broker
pub struct JobQueue {
    broker: Arc<BrokerPool>,
    queue_name: String,
}

impl JobQueue {
    pub fn new(broker: Arc<BrokerPool>, queue_name: impl Into<String>) -> Self {
        Self {
            broker,
            queue_name: queue_name.into(),
        }
    }

    fn pending_key(&self) -> String {
        format!("{}:pending", self.queue_name)
    }

    fn job_key(&self, id: &str) -> String {
        format!("{}:job:{}", self.queue_name, id)
    }

    /// Accoda un job e restituisce l'identificativo assegnato.
    ///
    /// L'inserimento è una transazione MULTI/EXEC: o il job entra in coda
    /// con il suo stato iniziale, o non resta traccia di nulla. Un errore
    /// di connessione esaurita arriva al chiamante senza essere mascherato.
    pub async fn enqueue(&self, function: &str, kwargs: Value) -> Result<String> {
        let mut conn = self.broker.get().await?;

        let envelope = JobEnvelope {
            id: Uuid::new_v4().to_string(),
            function: function.to_string(),
            kwargs,
            enqueued_at: Utc::now(),
        };
        let payload =
            serde_json::to_string(&envelope).map_err(|e| AppError::Internal(e.to_string()))?;
        let job_key = self.job_key(&envelope.id);

        redis::pipe()
            .atomic()
            .hset(&job_key, "status", "queued")
            .ignore()
            .hset(&job_key, "function", function)
            .ignore()
            .rpush(self.pending_key(), &payload)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| AppError::Broker(e.to_string()))?;

        tracing::info!(
            job_id = %envelope.id,
            function,
            queue = %self.queue_name,
            "Job accodato"
        );
        Ok(envelope.id)
    }

    /// Stato corrente del job, sempre letto fresco dal broker.
    ///
    /// Un identificativo sconosciuto restituisce `NotFound`, non un errore.
    pub async fn status(&self, id: &str) -> Result<JobStatus> {
        let mut conn = self.broker.get().await?;
        let raw: Option<String> = redis::cmd("HGET")
            .arg(self.job_key(id))
            .arg("status")
            .query_async(&mut conn)
            .await
            .map_err(|e| AppError::Broker(e.to_string()))?;
        Ok(JobStatus::from_raw(raw.as_deref()))
    }

    /// Risultato del job: presente solo quando lo stato è `complete`.
    ///
    /// Per ogni altro stato, `failed` compreso, restituisce `None`: il
    /// dettaglio del fallimento si legge da `status`.
    pub async fn result(&self, id: &str) -> Result<Option<Value>> {
        let mut conn = self.broker.get().await?;
        let (status, result): (Option<String>, Option<String>) = redis::cmd("HMGET")
            .arg(self.job_key(id))
            .arg("status")
            .arg("result")
            .query_async(&mut conn)
            .await
            .map_err(|e| AppError::Broker(e.to_string()))?;

        result_from_fields(status.as_deref(), result)
    }
}

/// Decide se i campi letti dall'hash del job costituiscono un risultato
/// disponibile
fn result_from_fields(status: Option<&str>, result: Option<String>) -> Result<Option<Value>> {
    if JobStatus::from_raw(status) != JobStatus::Complete {
        return Ok(None);
    }

    match result {
        Some(raw) => {
            let value = serde_json::from_str(&raw)
                .map_err(|e| AppError::Internal(format!("payload risultato non valido: {}", e)))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn queue() -> JobQueue {
        let broker = Arc::new(BrokerPool::new(&Config::default()));
        JobQueue::new(broker, "clipflow_tasks")
    }

    #[test]
    fn test_key_naming() {
        let queue = queue();
        assert_eq!(queue.pending_key(), "clipflow_tasks:pending");
        assert_eq!(queue.job_key("abc"), "clipflow_tasks:job:abc");
    }

    #[test]
    fn test_result_only_for_complete_jobs() {
        let payload = Some(r#"{"clips": 3}"#.to_string());

        let value = result_from_fields(Some("complete"), payload.clone())
            .unwrap()
            .unwrap();
        assert_eq!(value["clips"], 3);

        // Un job fallito non ha risultato: il dettaglio si legge da status
        assert!(result_from_fields(Some("failed"), payload.clone())
            .unwrap()
            .is_none());
        assert!(result_from_fields(Some("queued"), payload.clone())
            .unwrap()
            .is_none());
        assert!(result_from_fields(None, payload).unwrap().is_none());

        // Completato ma senza payload registrato
        assert!(result_from_fields(Some("complete"), None).unwrap().is_none());
    }

    #[test]
    fn test_result_invalid_payload_is_error() {
        let result = result_from_fields(Some("complete"), Some("{non json".to_string()));
        assert!(result.is_err());
    }
}
