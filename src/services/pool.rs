//! Gestione pigra della connessione condivisa verso un backend esterno
//!
//! Ogni backend (database, broker) ha esattamente un handle per processo,
//! creato al primo uso e ritentato con backoff sugli errori transitori.
//! I chiamanti concorrenti durante la creazione attendono tutti lo stesso
//! esito: mai più di una sequenza di connessione in volo per backend.

use std::future::Future;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use futures::FutureExt;
use thiserror::Error;
use tokio::sync::watch;

use crate::utils::retry::{retry_with_backoff, Backoff, RetryError};

/// Errore di un singolo tentativo di connessione, classificato dal
/// connettore specifico del backend.
#[derive(Debug, Clone, Error)]
pub enum ConnectError {
    /// Errore che può risolversi da solo (timeout, connection refused,
    /// backend in avvio): viene ritentato
    #[error("{0}")]
    Transient(String),

    /// Errore di configurazione (credenziali, URL malformato): ritentare
    /// produrrebbe solo lo stesso fallimento
    #[error("{0}")]
    Fatal(String),
}

impl ConnectError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ConnectError::Transient(_))
    }
}

/// Errore terminale restituito ai chiamanti del pool
#[derive(Debug, Clone, Error)]
pub enum PoolError {
    /// Budget di tentativi esaurito. Non avvelena le chiamate successive:
    /// il prossimo `get()` riparte dal tentativo 1.
    #[error("Connessione a {backend} esaurita dopo {attempts} tentativi: {last}")]
    Exhausted {
        backend: &'static str,
        attempts: u32,
        last: String,
    },

    /// Fallimento non transitorio, propagato senza retry
    #[error("Connessione a {backend} fallita: {message}")]
    Fatal {
        backend: &'static str,
        message: String,
    },
}

type ConnectFn<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, ConnectError>> + Send + Sync>;

type Outcome<T> = Option<Result<T, PoolError>>;

enum Slot<T> {
    Empty,
    Connecting(watch::Receiver<Outcome<T>>),
    Ready(T),
}

struct Inner<T> {
    slot: Slot<T>,
    // Incrementata da take(): un tentativo partito prima della chiusura
    // non deve reinstallare il proprio handle
    generation: u64,
}

/// Pool di connessione pigro e condiviso per un singolo backend.
///
/// L'handle `T` deve essere clonabile a basso costo (pool sqlx, connection
/// manager redis): tutti i chiamanti ricevono cloni dello stesso handle.
pub struct LazyPool<T: Clone + Send + Sync + 'static> {
    backend: &'static str,
    max_attempts: u32,
    backoff: Backoff,
    connect: ConnectFn<T>,
    state: Arc<Mutex<Inner<T>>>,
}

impl<T: Clone + Send + Sync + 'static> LazyPool<T> {
    pub fn new<F, Fut>(
        backend: &'static str,
        max_attempts: u32,
        backoff: Backoff,
        connect: F,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ConnectError>> + Send + 'static,
    {
        Self {
            backend,
            max_attempts,
            backoff,
            connect: Arc::new(move || connect().boxed()),
            state: Arc::new(Mutex::new(Inner {
                slot: Slot::Empty,
                generation: 0,
            })),
        }
    }

    /// Restituisce l'handle condiviso, creandolo al primo uso.
    ///
    /// Se una creazione è già in volo, attende quell'esito invece di
    /// avviarne una seconda. L'annullamento del chiamante non interrompe
    /// il tentativo condiviso: gli altri chiamanti continuano ad attenderlo.
    pub async fn get(&self) -> Result<T, PoolError> {
        let mut rx = {
            let mut inner = self.state.lock().unwrap();
            match &inner.slot {
                Slot::Ready(handle) => return Ok(handle.clone()),
                Slot::Connecting(rx) => rx.clone(),
                Slot::Empty => {
                    let (tx, rx) = watch::channel(None);
                    inner.slot = Slot::Connecting(rx.clone());
                    self.spawn_connect(tx, inner.generation);
                    rx
                }
            }
        };

        loop {
            {
                let outcome = rx.borrow_and_update();
                if let Some(result) = outcome.as_ref() {
                    return result.clone();
                }
            }
            if rx.changed().await.is_err() {
                // Il task di connessione è caduto senza esito: il prossimo
                // get() riparte da zero
                return Err(PoolError::Fatal {
                    backend: self.backend,
                    message: "tentativo di connessione interrotto".to_string(),
                });
            }
        }
    }

    /// Vero se un handle è attualmente stabilito.
    ///
    /// È il flag di readiness letto dagli health check: parte falso, diventa
    /// vero alla prima connessione riuscita (anche quella pigra dopo un
    /// avvio degradato) e torna falso dopo `take()`.
    pub fn is_ready(&self) -> bool {
        matches!(self.state.lock().unwrap().slot, Slot::Ready(_))
    }

    /// Rimuove e restituisce l'handle corrente, se esiste. Idempotente:
    /// senza handle è un no-op che restituisce `None`.
    ///
    /// Lo smaltimento effettivo (es. `PgPool::close`) spetta al gestore
    /// proprietario del pool, mai ai chiamanti di `get()`.
    pub fn take(&self) -> Option<T> {
        let mut inner = self.state.lock().unwrap();
        inner.generation += 1;
        match std::mem::replace(&mut inner.slot, Slot::Empty) {
            Slot::Ready(handle) => Some(handle),
            _ => None,
        }
    }

    fn spawn_connect(&self, tx: watch::Sender<Outcome<T>>, generation: u64) {
        let backend = self.backend;
        let max_attempts = self.max_attempts;
        let backoff = self.backoff;
        let connect = self.connect.clone();
        let state = self.state.clone();

        tokio::spawn(async move {
            let result = retry_with_backoff(
                backend,
                max_attempts,
                backoff,
                || (connect)(),
                ConnectError::is_transient,
            )
            .await;

            let outcome: Result<T, PoolError> = match result {
                Ok(handle) => {
                    tracing::info!(backend, "Connessione stabilita");
                    Ok(handle)
                }
                Err(RetryError::Exhausted { attempts, last }) => {
                    tracing::error!(
                        backend,
                        attempts,
                        "Tentativi di connessione esauriti: {}",
                        last
                    );
                    Err(PoolError::Exhausted {
                        backend,
                        attempts,
                        last: last.to_string(),
                    })
                }
                Err(RetryError::Fatal(e)) => {
                    tracing::error!(backend, "Errore di connessione non recuperabile: {}", e);
                    Err(PoolError::Fatal {
                        backend,
                        message: e.to_string(),
                    })
                }
            };

            {
                let mut inner = state.lock().unwrap();
                if inner.generation == generation {
                    inner.slot = match &outcome {
                        Ok(handle) => Slot::Ready(handle.clone()),
                        // Un fallimento libera lo slot: il prossimo get()
                        // avvia una sequenza nuova
                        Err(_) => Slot::Empty,
                    };
                }
            }

            // Consegna l'esito a tutti i chiamanti in attesa, anche se nel
            // frattempo il pool è stato chiuso
            let _ = tx.send(Some(outcome));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast_backoff() -> Backoff {
        Backoff::new(
            Duration::from_millis(10),
            2.0,
            Duration::from_millis(10),
            Duration::from_millis(100),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_retries_then_succeeds() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let pool = LazyPool::new("test", 10, fast_backoff(), move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n <= 2 {
                    Err(ConnectError::Transient("connection refused".to_string()))
                } else {
                    Ok(format!("handle-{}", n))
                }
            }
        });

        let handle = pool.get().await.unwrap();
        assert_eq!(handle, "handle-3");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);

        // L'handle resta in cache: nessun nuovo tentativo
        let again = pool.get().await.unwrap();
        assert_eq!(again, handle);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert!(pool.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_does_not_poison() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let pool: LazyPool<String> = LazyPool::new("test", 3, fast_backoff(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(ConnectError::Transient("timeout".to_string())) }
        });

        match pool.get().await {
            Err(PoolError::Exhausted { attempts: n, .. }) => assert_eq!(n, 3),
            other => panic!("atteso Exhausted, ottenuto {:?}", other),
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert!(!pool.is_ready());

        // La chiamata successiva avvia una sequenza nuova da capo
        let _ = pool.get().await;
        assert_eq!(attempts.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_fatal_error_not_retried() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let pool: LazyPool<String> = LazyPool::new("test", 10, fast_backoff(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(ConnectError::Fatal("password errata".to_string())) }
        });

        assert!(matches!(pool.get().await, Err(PoolError::Fatal { .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_cold_callers_share_one_attempt() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let pool = Arc::new(LazyPool::new("test", 10, fast_backoff(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok("shared".to_string())
            }
        }));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let pool = pool.clone();
            tasks.push(tokio::spawn(async move { pool.get().await }));
        }

        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), "shared");
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_take_is_idempotent() {
        let pool = LazyPool::new("test", 10, fast_backoff(), || async {
            Ok("handle".to_string())
        });

        let _ = pool.get().await.unwrap();
        assert!(pool.is_ready());

        assert_eq!(pool.take(), Some("handle".to_string()));
        assert!(!pool.is_ready());
        // Seconda chiusura: no-op
        assert_eq!(pool.take(), None);
    }

    #[tokio::test]
    async fn test_independent_backends_one_degraded() {
        let db_pool: LazyPool<String> = LazyPool::new("database", 1, fast_backoff(), || async {
            Err(ConnectError::Fatal("credenziali rifiutate".to_string()))
        });
        let queue_pool =
            LazyPool::new("redis", 1, fast_backoff(), || async { Ok("conn".to_string()) });

        // Avvio tollerante: ogni backend fa la sua inizializzazione e il
        // fallimento di uno non tocca l'altro
        let db_ready = db_pool.get().await.is_ok();
        let queue_ready = queue_pool.get().await.is_ok();

        assert!(!db_ready);
        assert!(queue_ready);
        assert!(!db_pool.is_ready());
        assert!(queue_pool.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn test_degraded_start_then_lazy_recovery() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let pool = LazyPool::new("test", 1, fast_backoff(), move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n == 1 {
                    Err(ConnectError::Transient("backend in avvio".to_string()))
                } else {
                    Ok("recovered".to_string())
                }
            }
        });

        // Init all'avvio fallita: il processo parte comunque, flag spento
        assert!(pool.get().await.is_err());
        assert!(!pool.is_ready());

        // Primo uso successivo: riconnessione pigra, flag acceso
        assert_eq!(pool.get().await.unwrap(), "recovered");
        assert!(pool.is_ready());
    }
}
