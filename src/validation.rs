//! Reusable step validators.
//!
//! Every constructor takes the message to show when the answer is rejected,
//! so flows can pass localized text.

use std::sync::Arc;

use reqwest::Url;

use crate::dialogue::Validator;

/// Maximum length accepted for titles
pub const MAX_TITLE_LENGTH: usize = 255;

/// Rejects blank answers
pub fn non_empty(message: impl Into<String>) -> Validator {
    let message = message.into();
    Arc::new(move |text: &str| -> Result<(), String> {
        if text.trim().is_empty() {
            Err(message.clone())
        } else {
            Ok(())
        }
    })
}

/// Rejects answers longer than `max` characters once trimmed
pub fn max_length(max: usize, message: impl Into<String>) -> Validator {
    let message = message.into();
    Arc::new(move |text: &str| -> Result<(), String> {
        if text.trim().chars().count() > max {
            Err(message.clone())
        } else {
            Ok(())
        }
    })
}

/// Accepts absolute `http`/`https` URLs with a host
pub fn http_url(message: impl Into<String>) -> Validator {
    let message = message.into();
    Arc::new(move |text: &str| -> Result<(), String> {
        if is_http_url(text) {
            Ok(())
        } else {
            Err(message.clone())
        }
    })
}

/// Rejects text that looks like a bot command
pub fn not_command(message: impl Into<String>) -> Validator {
    let message = message.into();
    Arc::new(move |text: &str| -> Result<(), String> {
        if text.trim_start().starts_with('/') {
            Err(message.clone())
        } else {
            Ok(())
        }
    })
}

/// Runs validators in order and reports the first rejection
pub fn all_of(validators: Vec<Validator>) -> Validator {
    Arc::new(move |text: &str| -> Result<(), String> {
        validators.iter().try_for_each(|validator| validator(text))
    })
}

pub fn is_http_url(text: &str) -> bool {
    match Url::parse(text.trim()) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty() {
        let validator = non_empty("empty");
        assert!(validator("Chocolate Chip Cookies").is_ok());
        assert_eq!(validator("   "), Err("empty".to_string()));
        assert_eq!(validator(""), Err("empty".to_string()));
    }

    #[test]
    fn test_max_length_counts_characters() {
        let validator = max_length(MAX_TITLE_LENGTH, "too long");
        assert!(validator(&"a".repeat(255)).is_ok());
        assert!(validator(&"é".repeat(255)).is_ok());
        assert!(validator(&"a".repeat(256)).is_err());
        assert!(validator(&format!("  {}  ", "a".repeat(255))).is_ok());
    }

    #[test]
    fn test_http_url() {
        assert!(is_http_url("http://a"));
        assert!(is_http_url("https://example.com/image.png"));
        assert!(is_http_url("  https://example.com  "));
        assert!(!is_http_url("ftp://example.com/file"));
        assert!(!is_http_url("example.com"));
        assert!(!is_http_url("not a url"));
        assert!(!is_http_url("/end"));
    }

    #[test]
    fn test_not_command() {
        let validator = not_command("command");
        assert!(validator("https://a.b").is_ok());
        assert!(validator("/start").is_err());
        assert!(validator(" /end").is_err());
    }

    #[test]
    fn test_all_of_reports_first_failure() {
        let validator = all_of(vec![non_empty("empty"), http_url("url")]);
        assert_eq!(validator(""), Err("empty".to_string()));
        assert_eq!(validator("nope"), Err("url".to_string()));
        assert!(validator("https://ok.example").is_ok());
    }
}
