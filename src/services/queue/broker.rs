//! Connessione al broker Redis della coda job

use redis::aio::ConnectionManager;

use crate::config::Config;
use crate::services::pool::{ConnectError, LazyPool, PoolError};

/// Gestore dell'handle condiviso verso il broker.
///
/// Il `ConnectionManager` di redis è multiplexato e clonabile: un solo
/// handle per processo serve tutti i chiamanti.
pub struct BrokerPool {
    pool: LazyPool<ConnectionManager>,
}

impl BrokerPool {
    pub fn new(config: &Config) -> Self {
        let url = config.redis_url.clone();
        let pool = LazyPool::new(
            "redis",
            config.connect_max_attempts,
            config.backoff(),
            move || {
                let url = url.clone();
                async move { establish(&url).await }
            },
        );
        Self { pool }
    }

    /// Ottieni l'handle condiviso, creandolo al primo uso
    pub async fn get(&self) -> Result<ConnectionManager, PoolError> {
        self.pool.get().await
    }

    /// Flag di readiness letto dagli health check
    pub fn is_ready(&self) -> bool {
        self.pool.is_ready()
    }

    /// Round-trip minimo verso il broker
    pub async fn ping(&self) -> Result<(), String> {
        let mut conn = self.get().await.map_err(|e| e.to_string())?;
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| e.to_string())?;
        if pong != "PONG" {
            return Err(format!("risposta inattesa dal broker: {}", pong));
        }
        Ok(())
    }

    /// Rilascia l'handle. No-op se non è mai stato creato.
    pub fn close(&self) {
        if self.pool.take().is_some() {
            tracing::info!("Handle broker rilasciato");
        }
    }
}

async fn establish(url: &str) -> Result<ConnectionManager, ConnectError> {
    // URL malformato: errore di configurazione, inutile ritentare
    let client = redis::Client::open(url).map_err(|e| ConnectError::Fatal(e.to_string()))?;
    client
        .get_connection_manager()
        .await
        .map_err(classify_error)
}

/// Credenziali e configurazione non vanno ritentate; tutto il resto
/// (refused, timeout, broker in avvio) sì
fn classify_error(e: redis::RedisError) -> ConnectError {
    match e.kind() {
        redis::ErrorKind::AuthenticationFailed | redis::ErrorKind::InvalidClientConfig => {
            ConnectError::Fatal(e.to_string())
        }
        _ => ConnectError::Transient(e.to_string()),
    }
}
