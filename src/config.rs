use std::path::PathBuf;
use std::time::Duration;

use crate::utils::retry::Backoff;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// URL Postgres, già normalizzato allo schema `postgresql://`
    pub database_url: String,
    /// URL canonico del broker Redis (ricostruito da host/porta/password
    /// se `REDIS_URL` non è impostata)
    pub redis_url: String,
    /// Coda di destinazione dei job
    pub queue_name: String,
    pub connect_max_attempts: u32,
    pub backoff_min: Duration,
    pub backoff_max: Duration,
    pub max_video_duration: u64,
    pub max_clips: u32,
    pub clip_duration: u64,
    pub temp_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            database_url: "postgresql://localhost:5432/clipflow".to_string(),
            redis_url: "redis://localhost:6379/0".to_string(),
            queue_name: "clipflow_tasks".to_string(),
            connect_max_attempts: 10,
            backoff_min: Duration::from_secs(2),
            backoff_max: Duration::from_secs(30),
            max_video_duration: 3600,
            max_clips: 10,
            clip_duration: 30,
            temp_dir: std::env::temp_dir().join("clipflow"),
            output_dir: PathBuf::from("outputs"),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("CLIPFLOW_HOST") {
            config.host = host;
        }

        if let Ok(port) = std::env::var("CLIPFLOW_PORT") {
            if let Ok(p) = port.parse() {
                config.port = p;
            }
        }

        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database_url = normalize_database_url(&url);
        }

        // Railway/Render espongono REDIS_URL; in locale si usano le
        // variabili discrete e l'URL canonico viene ricostruito
        if let Ok(url) = std::env::var("REDIS_URL") {
            config.redis_url = url;
        } else {
            let host =
                std::env::var("REDIS_HOST").unwrap_or_else(|_| "localhost".to_string());
            let port = std::env::var("REDIS_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(6379);
            let password = std::env::var("REDIS_PASSWORD").ok();
            config.redis_url = redis_url_from_parts(&host, port, password.as_deref());
        }

        if let Ok(queue) = std::env::var("CLIPFLOW_QUEUE") {
            config.queue_name = queue;
        }

        if let Ok(attempts) = std::env::var("CONNECT_MAX_ATTEMPTS") {
            if let Ok(a) = attempts.parse() {
                config.connect_max_attempts = a;
            }
        }

        if let Ok(secs) = std::env::var("CONNECT_BACKOFF_MIN_SECS") {
            if let Ok(s) = secs.parse() {
                config.backoff_min = Duration::from_secs(s);
            }
        }

        if let Ok(secs) = std::env::var("CONNECT_BACKOFF_MAX_SECS") {
            if let Ok(s) = secs.parse() {
                config.backoff_max = Duration::from_secs(s);
            }
        }

        if let Ok(duration) = std::env::var("MAX_VIDEO_DURATION") {
            if let Ok(d) = duration.parse() {
                config.max_video_duration = d;
            }
        }

        if let Ok(clips) = std::env::var("MAX_CLIPS") {
            if let Ok(c) = clips.parse() {
                config.max_clips = c;
            }
        }

        if let Ok(duration) = std::env::var("CLIP_DURATION") {
            if let Ok(d) = duration.parse() {
                config.clip_duration = d;
            }
        }

        if let Ok(dir) = std::env::var("TEMP_DIR") {
            config.temp_dir = PathBuf::from(dir);
        }

        if let Ok(dir) = std::env::var("OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }

        config
    }

    /// Politica di backoff per le connessioni ai backend
    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_secs(1),
            2.0,
            self.backoff_min,
            self.backoff_max,
        )
    }

    /// URL del broker con le credenziali oscurate, per i log
    pub fn redacted_redis_url(&self) -> String {
        redact_url(&self.redis_url)
    }
}

/// Normalizza lo schema dell'URL database: `postgres://` → `postgresql://`.
///
/// La query string viene preservata (sqlx accetta `sslmode`).
pub fn normalize_database_url(url: &str) -> String {
    match url.strip_prefix("postgres://") {
        Some(rest) => format!("postgresql://{}", rest),
        None => url.to_string(),
    }
}

/// Ricostruisce l'URL canonico del broker da host/porta/password discreti
pub fn redis_url_from_parts(host: &str, port: u16, password: Option<&str>) -> String {
    match password {
        Some(p) if !p.is_empty() => {
            format!("redis://:{}@{}:{}/0", urlencoding::encode(p), host, port)
        }
        _ => format!("redis://{}:{}/0", host, port),
    }
}

/// Oscura le credenziali in un URL (`redis://:segreto@host` → `redis://***@host`)
pub fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***@{}", &url[..scheme_end], &url[at + 1..])
        }
        _ => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_database_url() {
        assert_eq!(
            normalize_database_url("postgres://u:p@host:5432/db"),
            "postgresql://u:p@host:5432/db"
        );
        assert_eq!(
            normalize_database_url("postgresql://host/db?sslmode=require"),
            "postgresql://host/db?sslmode=require"
        );
    }

    #[test]
    fn test_redis_url_from_parts() {
        assert_eq!(
            redis_url_from_parts("localhost", 6379, None),
            "redis://localhost:6379/0"
        );
        assert_eq!(
            redis_url_from_parts("cache.interna", 6380, Some("s3gr@to")),
            "redis://:s3gr%40to@cache.interna:6380/0"
        );
        // Password vuota equivale a nessuna password
        assert_eq!(
            redis_url_from_parts("localhost", 6379, Some("")),
            "redis://localhost:6379/0"
        );
    }

    #[test]
    fn test_redact_url() {
        assert_eq!(
            redact_url("redis://:segreto@host:6379/0"),
            "redis://***@host:6379/0"
        );
        assert_eq!(redact_url("redis://host:6379/0"), "redis://host:6379/0");
    }
}
