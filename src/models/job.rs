use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Stato di un job così come riportato dal broker.
///
/// Sempre letto fresco dal broker: i worker girano fuori processo e lo
/// stato cambia in modo asincrono, quindi non viene mai messo in cache.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum JobStatus {
    Queued,
    InProgress,
    Complete,
    Failed,
    /// Il broker non ha traccia del job: mai inviato oppure scaduto dalla
    /// retention dei risultati. Esito valido, non un errore.
    NotFound,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::InProgress => write!(f, "in-progress"),
            JobStatus::Complete => write!(f, "complete"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::NotFound => write!(f, "not-found"),
        }
    }
}

impl JobStatus {
    /// Interpreta il valore grezzo letto dal broker.
    ///
    /// `None` (chiave assente) e valori non riconosciuti diventano
    /// `NotFound`: "sconosciuto / forse scaduto".
    pub fn from_raw(raw: Option<&str>) -> JobStatus {
        match raw {
            Some("queued") => JobStatus::Queued,
            Some("in-progress") => JobStatus::InProgress,
            Some("complete") => JobStatus::Complete,
            Some("failed") => JobStatus::Failed,
            _ => JobStatus::NotFound,
        }
    }
}

/// Busta serializzata sulla lista dei job in attesa.
///
/// Il payload `kwargs` è opaco: lo interpreta solo il worker di destinazione.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEnvelope {
    pub id: String,
    pub function: String,
    pub kwargs: Value,
    pub enqueued_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_known_states() {
        assert_eq!(JobStatus::from_raw(Some("queued")), JobStatus::Queued);
        assert_eq!(
            JobStatus::from_raw(Some("in-progress")),
            JobStatus::InProgress
        );
        assert_eq!(JobStatus::from_raw(Some("complete")), JobStatus::Complete);
        assert_eq!(JobStatus::from_raw(Some("failed")), JobStatus::Failed);
    }

    #[test]
    fn test_from_raw_missing_or_unknown_is_not_found() {
        assert_eq!(JobStatus::from_raw(None), JobStatus::NotFound);
        assert_eq!(JobStatus::from_raw(Some("boh")), JobStatus::NotFound);
    }

    #[test]
    fn test_display_roundtrip() {
        for status in [
            JobStatus::Queued,
            JobStatus::InProgress,
            JobStatus::Complete,
            JobStatus::Failed,
        ] {
            let raw = status.to_string();
            assert_eq!(JobStatus::from_raw(Some(&raw)), status);
        }
    }

    #[test]
    fn test_envelope_json_shape() {
        let envelope = JobEnvelope {
            id: "abc".to_string(),
            function: "process_video".to_string(),
            kwargs: serde_json::json!({"task_id": "t1"}),
            enqueued_at: Utc::now(),
        };
        let value: Value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["id"], "abc");
        assert_eq!(value["function"], "process_video");
        assert_eq!(value["kwargs"]["task_id"], "t1");
        assert!(value["enqueued_at"].is_string());
    }
}
