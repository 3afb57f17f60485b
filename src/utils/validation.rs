//! Validazione degli input per la creazione dei task

use regex_lite::Regex;

use crate::error::{AppError, Result};

/// Domini consentiti per l'URL sorgente (guardia anti-SSRF)
pub const ALLOWED_SOURCE_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "youtu.be",
    "m.youtube.com",
];

/// Limiti per la dimensione del font dei sottotitoli
pub const MIN_FONT_SIZE: i32 = 10;
pub const MAX_FONT_SIZE: i32 = 100;

/// Verifica che l'URL sorgente appartenga a un dominio consentito.
///
/// URL con userinfo (`https://utente@host/...`) non superano l'estrazione
/// del dominio e vengono rifiutati.
pub fn validate_source_url(url: &str) -> Result<()> {
    let re = Regex::new(r"^https?://([A-Za-z0-9.-]+)(?::\d+)?(?:[/?#]|$)")
        .expect("regex dominio valida");

    let Some(captures) = re.captures(url) else {
        return Err(AppError::InvalidSourceUrl(format!(
            "formato non riconosciuto: {}",
            url
        )));
    };

    let host = captures[1].to_lowercase();
    if !ALLOWED_SOURCE_HOSTS.contains(&host.as_str()) {
        return Err(AppError::InvalidSourceUrl(format!(
            "dominio non consentito: {}",
            host
        )));
    }

    Ok(())
}

/// Verifica i limiti della dimensione font
pub fn validate_font_size(font_size: i32) -> Result<()> {
    if !(MIN_FONT_SIZE..=MAX_FONT_SIZE).contains(&font_size) {
        return Err(AppError::BadRequest(format!(
            "La dimensione del font deve essere tra {} e {}",
            MIN_FONT_SIZE, MAX_FONT_SIZE
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_source_url_allowed_hosts() {
        assert!(validate_source_url("https://www.youtube.com/watch?v=abc123").is_ok());
        assert!(validate_source_url("https://youtu.be/abc123").is_ok());
        assert!(validate_source_url("http://m.youtube.com/watch?v=abc123").is_ok());
        assert!(validate_source_url("https://YOUTUBE.com/watch?v=abc").is_ok());
    }

    #[test]
    fn test_validate_source_url_rejects_other_hosts() {
        assert!(validate_source_url("https://esempio.com/video").is_err());
        assert!(validate_source_url("https://youtube.com.evil.com/x").is_err());
    }

    #[test]
    fn test_validate_source_url_rejects_malformed() {
        assert!(validate_source_url("ftp://youtube.com/x").is_err());
        assert!(validate_source_url("non-un-url").is_err());
        // Il trucco dello userinfo non deve passare
        assert!(validate_source_url("https://youtube.com@evil.com/x").is_err());
    }

    #[test]
    fn test_validate_font_size() {
        assert!(validate_font_size(24).is_ok());
        assert!(validate_font_size(10).is_ok());
        assert!(validate_font_size(100).is_ok());
        assert!(validate_font_size(9).is_err());
        assert!(validate_font_size(101).is_err());
    }
}
