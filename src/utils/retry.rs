//! Backoff esponenziale e retry per le connessioni ai backend esterni
//!
//! La stessa politica viene usata sia per il database che per il broker,
//! così gli operatori hanno un unico modello mentale da configurare.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// Politica di backoff esponenziale.
///
/// L'attesa prima del tentativo `n` è `base * multiplier^(n-1)`,
/// limitata all'intervallo `[min, max]`.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub base: Duration,
    pub multiplier: f64,
    pub min: Duration,
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            multiplier: 2.0,
            min: Duration::from_secs(2),
            max: Duration::from_secs(30),
        }
    }
}

impl Backoff {
    pub fn new(base: Duration, multiplier: f64, min: Duration, max: Duration) -> Self {
        Self {
            base,
            multiplier,
            min,
            max,
        }
    }

    /// Calcola l'attesa prima del tentativo `attempt` (1-based).
    ///
    /// Un `attempt` pari a 0 viene trattato come 1.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let factor = self.multiplier.powi(attempt as i32 - 1);
        let millis = (self.base.as_millis() as f64 * factor).min(self.max.as_millis() as f64);
        Duration::from_millis(millis as u64)
            .max(self.min)
            .min(self.max)
    }
}

/// Esito terminale di una sequenza di tentativi
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Errori transitori persistiti oltre il budget di tentativi
    #[error("tentativi esauriti dopo {attempts}: {last}")]
    Exhausted { attempts: u32, last: E },

    /// Errore non transitorio: ritentare sprecherebbe solo il budget
    #[error("{0}")]
    Fatal(E),
}

/// Esegue `op` ritentando gli errori transitori secondo la politica di backoff.
///
/// `is_transient` classifica l'errore: un errore non transitorio interrompe
/// la sequenza al primo tentativo. Ogni fallimento transitorio viene loggato
/// a livello warning con backend e numero di tentativo.
pub async fn retry_with_backoff<T, E, F, Fut, P>(
    backend: &str,
    max_attempts: u32,
    backoff: Backoff,
    mut op: F,
    is_transient: P,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if !is_transient(&e) => return Err(RetryError::Fatal(e)),
            Err(e) => {
                if attempt >= max_attempts {
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: e,
                    });
                }
                let delay = backoff.next_delay(attempt);
                tracing::warn!(
                    backend,
                    attempt,
                    max_attempts,
                    wait_ms = delay.as_millis() as u64,
                    "Connessione fallita, nuovo tentativo: {}",
                    e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_next_delay_monotone_and_bounded() {
        let backoff = Backoff::default();
        let mut previous = Duration::ZERO;
        for attempt in 1..=10 {
            let delay = backoff.next_delay(attempt);
            assert!(delay >= previous, "attesa decrescente al tentativo {}", attempt);
            assert!(delay >= backoff.min);
            assert!(delay <= backoff.max);
            previous = delay;
        }
    }

    #[test]
    fn test_next_delay_exponential_growth() {
        let backoff = Backoff::new(
            Duration::from_secs(1),
            2.0,
            Duration::from_millis(0),
            Duration::from_secs(30),
        );
        assert_eq!(backoff.next_delay(1), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(2), Duration::from_secs(2));
        assert_eq!(backoff.next_delay(3), Duration::from_secs(4));
        // Oltre il limite superiore resta bloccata a max
        assert_eq!(backoff.next_delay(10), Duration::from_secs(30));
    }

    #[test]
    fn test_next_delay_attempt_zero_clamped() {
        let backoff = Backoff::default();
        assert_eq!(backoff.next_delay(0), backoff.next_delay(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(
            "test",
            10,
            Backoff::default(),
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n <= 2 {
                        Err("connection refused".to_string())
                    } else {
                        Ok(n)
                    }
                }
            },
            |_| true,
        )
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhausts_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff(
            "test",
            4,
            Backoff::default(),
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("timeout".to_string()) }
            },
            |_| true,
        )
        .await;

        match result {
            Err(RetryError::Exhausted { attempts, .. }) => assert_eq!(attempts, 4),
            _ => panic!("atteso Exhausted"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_retry_fatal_stops_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff(
            "test",
            10,
            Backoff::default(),
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("password errata".to_string()) }
            },
            |_| false,
        )
        .await;

        assert!(matches!(result, Err(RetryError::Fatal(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
