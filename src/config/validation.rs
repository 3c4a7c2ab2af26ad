//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits > 0, percentages within 0-100)
//! - Check static services (unique uids, parseable URLs)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClientConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

use crate::config::schema::ClientConfig;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("engine.allowed_concurrency must be greater than 0")]
    ZeroConcurrency,

    #[error("breaker.error_threshold_percentage must be within 0-100, got {0}")]
    ThresholdOutOfRange(f64),

    #[error("{field} must be greater than 0")]
    ZeroDuration { field: &'static str },

    #[error("retry.base_delay_ms ({base}) exceeds retry.max_delay_ms ({max})")]
    BackoffBounds { base: u64, max: u64 },

    #[error("duplicate service uid '{0}'")]
    DuplicateService(String),

    #[error("service '{uid}' has an invalid url '{url}': {reason}")]
    InvalidUrl { uid: String, url: String, reason: String },

    #[error("observability.log_format must be 'pretty' or 'json', got '{0}'")]
    UnknownLogFormat(String),
}

pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.engine.allowed_concurrency == 0 {
        errors.push(ValidationError::ZeroConcurrency);
    }

    let threshold = config.breaker.error_threshold_percentage;
    if !(0.0..=100.0).contains(&threshold) {
        errors.push(ValidationError::ThresholdOutOfRange(threshold));
    }

    if config.breaker.metrics_window == Duration::ZERO {
        errors.push(ValidationError::ZeroDuration { field: "breaker.metrics_window" });
    }
    if config.cache.enabled && config.cache.retention == Duration::ZERO {
        errors.push(ValidationError::ZeroDuration { field: "cache.retention" });
    }
    if config.collapser.enabled && config.collapser.every == Duration::ZERO {
        errors.push(ValidationError::ZeroDuration { field: "collapser.every" });
    }

    if config.retry.base_delay_ms > config.retry.max_delay_ms {
        errors.push(ValidationError::BackoffBounds {
            base: config.retry.base_delay_ms,
            max: config.retry.max_delay_ms,
        });
    }

    let mut seen = HashSet::new();
    for service in &config.services {
        if !seen.insert(service.uid.as_str()) {
            errors.push(ValidationError::DuplicateService(service.uid.clone()));
        }
        if let Err(e) = url::Url::parse(&service.url) {
            errors.push(ValidationError::InvalidUrl {
                uid: service.uid.clone(),
                url: service.url.clone(),
                reason: e.to_string(),
            });
        }
    }

    match config.observability.log_format.as_str() {
        "pretty" | "json" => {}
        other => errors.push(ValidationError::UnknownLogFormat(other.to_string())),
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
    use crate::registry::ServiceDescriptor;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ClientConfig::default()).is_ok());
    }

    #[test]
    fn test_reports_every_error() {
        let mut config = ClientConfig::default();
        config.engine.allowed_concurrency = 0;
        config.breaker.error_threshold_percentage = 120.0;
        config.observability.log_format = "xml".into();
        config.services.push(ServiceDescriptor::new("a", "users", "http://localhost:1"));
        config.services.push(ServiceDescriptor::new("a", "users", "not a url"));

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 5);
        assert!(errors.contains(&ValidationError::ZeroConcurrency));
        assert!(errors.contains(&ValidationError::ThresholdOutOfRange(120.0)));
        assert!(errors.contains(&ValidationError::DuplicateService("a".into())));
        assert!(errors.contains(&ValidationError::UnknownLogFormat("xml".into())));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidUrl { url, .. } if url == "not a url")));
    }

    #[test]
    fn test_disabled_sections_skip_duration_checks() {
        let mut config = ClientConfig::default();
        config.collapser.every = Duration::ZERO;
        assert!(validate_config(&config).is_ok());

        config.collapser.enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::ZeroDuration { field: "collapser.every" }]
        );
    }
}
