use crate::config::Config;
use crate::error::{HostsyncError, Result, ValidationError};
use std::collections::HashSet;

/// Longest stale window accepted, about a century
pub const MAX_STALE_AFTER_DAYS: i64 = 36_500;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_api(config, &mut errors);
        Self::validate_sources(config, &mut errors);
        Self::validate_storage(config, &mut errors);
        Self::validate_report(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(HostsyncError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_api(config: &Config, errors: &mut Vec<ValidationError>) {
        let base_url = &config.api.base_url;
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            errors.push(ValidationError::new(
                "api.base_url",
                format!("Base URL must start with http:// or https://, got '{}'", base_url),
            ));
        }

        if config.api.token_env.is_empty() {
            errors.push(ValidationError::new(
                "api.token_env",
                "Token environment variable name cannot be empty",
            ));
        }

        if config.api.token_header.is_empty() {
            errors.push(ValidationError::new(
                "api.token_header",
                "Token header name cannot be empty",
            ));
        }

        if config.api.timeout_secs == 0 {
            errors.push(ValidationError::new(
                "api.timeout_secs",
                "Timeout must be greater than 0",
            ));
        }

        if config.api.page_size == 0 {
            errors.push(ValidationError::new(
                "api.page_size",
                "Page size must be greater than 0",
            ));
        }
    }

    fn validate_sources(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.enabled_sources().next().is_none() {
            errors.push(ValidationError::new(
                "sources",
                "At least one source must be enabled",
            ));
        }

        let mut seen = HashSet::new();
        for (idx, source) in config.sources.iter().enumerate() {
            if !seen.insert(source.tag) {
                errors.push(ValidationError::new(
                    format!("sources[{}].tag", idx),
                    format!("Duplicate source: {}", source.tag),
                ));
            }

            if source.path.trim_matches('/').is_empty() {
                errors.push(ValidationError::new(
                    format!("sources[{}].path", idx),
                    "Endpoint path cannot be empty",
                ));
            }
        }
    }

    fn validate_storage(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.storage.database_path.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.database_path",
                "Database path cannot be empty",
            ));
        }

        if config.storage.batch_size == 0 {
            errors.push(ValidationError::new(
                "storage.batch_size",
                "Batch size must be greater than 0",
            ));
        }
    }

    fn validate_report(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.report.output_dir.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "report.output_dir",
                "Output directory cannot be empty",
            ));
        }

        let days = config.report.stale_after_days;
        if days <= 0 {
            errors.push(ValidationError::new(
                "report.stale_after_days",
                format!("Stale threshold must be positive, got {}", days),
            ));
        } else if days > MAX_STALE_AFTER_DAYS {
            errors.push(ValidationError::new(
                "report.stale_after_days",
                format!(
                    "Stale threshold must be at most {} days, got {}",
                    MAX_STALE_AFTER_DAYS, days
                ),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceTag;
    use std::path::PathBuf;

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_empty_database_path() {
        let mut config = Config::default();
        config.storage.database_path = PathBuf::new();
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_invalid_base_url() {
        let mut config = Config::default();
        config.api.base_url = "ftp://example.test".to_string();
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_duplicate_source_and_zero_page_size_reported_together() {
        let mut config = Config::default();
        config.sources[1].tag = SourceTag::Qualys;
        config.api.page_size = 0;

        match ConfigValidator::validate(&config) {
            Err(HostsyncError::ConfigValidation { errors }) => {
                let paths: Vec<_> = errors.iter().map(|e| e.path.as_str()).collect();
                assert!(paths.contains(&"api.page_size"));
                assert!(paths.contains(&"sources[1].tag"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_all_sources_disabled() {
        let mut config = Config::default();
        for source in &mut config.sources {
            source.enabled = false;
        }
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_stale_window_bounds() {
        let mut config = Config::default();
        config.report.stale_after_days = MAX_STALE_AFTER_DAYS;
        assert!(ConfigValidator::validate(&config).is_ok());

        config.report.stale_after_days = 100_000_000;
        match ConfigValidator::validate(&config) {
            Err(HostsyncError::ConfigValidation { errors }) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].path, "report.stale_after_days");
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
