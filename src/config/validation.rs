//! Settings validation
//!
//! Checks settings for correctness before anything is started:
//! - Upstream and Discord URLs are http(s)
//! - Intervals, timeouts and concurrency are non-zero
//! - The log level is one tracing understands

use super::settings::Settings;
use std::fmt;

/// Validation error details
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validation result
pub type ValidationResult = std::result::Result<(), Vec<ValidationError>>;

fn is_http_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    matches!(rest, Some(host) if !host.is_empty())
}

/// Validate settings
pub fn validate_settings(settings: &Settings) -> ValidationResult {
    let mut errors = Vec::new();

    if settings.api_url.trim().is_empty() {
        errors.push(ValidationError::new(
            "api_url",
            "Server status URL is required (set api_url or ROSTERWATCH_API_URL)",
        ));
    } else if !is_http_url(&settings.api_url) {
        errors.push(ValidationError::new(
            "api_url",
            format!("Invalid URL: {}", settings.api_url),
        ));
    }

    if !is_http_url(&settings.discord_api_url) {
        errors.push(ValidationError::new(
            "discord_api_url",
            format!("Invalid URL: {}", settings.discord_api_url),
        ));
    }

    for (field, value) in [
        ("tick_interval_secs", settings.tick_interval_secs),
        ("fetch_timeout_secs", settings.fetch_timeout_secs),
        ("publish_timeout_secs", settings.publish_timeout_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "Must be greater than 0"));
        }
    }

    if settings.max_concurrency == 0 {
        errors.push(ValidationError::new(
            "max_concurrency",
            "Must be greater than 0",
        ));
    }

    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&settings.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::new(
            "log_level",
            format!(
                "Invalid level '{}'. Must be one of: {}",
                settings.log_level,
                valid_levels.join(", ")
            ),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Settings {
        Settings {
            api_url: "https://example.com/servers".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_settings() {
        assert!(validate_settings(&valid()).is_ok());
    }

    #[test]
    fn test_missing_api_url() {
        let errors = validate_settings(&Settings::default()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "api_url");
    }

    #[test]
    fn test_bad_scheme() {
        let settings = Settings {
            api_url: "ftp://example.com".to_string(),
            discord_api_url: "https://".to_string(),
            ..valid()
        };
        let errors = validate_settings(&settings).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["api_url", "discord_api_url"]);
    }

    #[test]
    fn test_zero_values_rejected() {
        let settings = Settings {
            tick_interval_secs: 0,
            publish_timeout_secs: 0,
            max_concurrency: 0,
            ..valid()
        };
        let errors = validate_settings(&settings).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors
            .iter()
            .any(|e| e.to_string() == "max_concurrency: Must be greater than 0"));
    }

    #[test]
    fn test_log_level() {
        let settings = Settings {
            log_level: "loud".to_string(),
            ..valid()
        };
        assert!(validate_settings(&settings).is_err());

        let settings = Settings {
            log_level: "DEBUG".to_string(),
            ..valid()
        };
        assert!(validate_settings(&settings).is_ok());
    }
}
