//! Contains validation logic for the final Config struct.

use super::{Config, Result};
use crate::core::error::AppError;
use std::time::Duration;

/// Validates the configuration settings after loading and potential overrides.
/// Mutates the config to clamp values or set defaults where applicable and logical.
/// Internal helper for the builder's `build` method.
pub(crate) fn validate_config(config: &mut Config) -> Result<()> {
    if config.max_concurrency == 0 {
        tracing::warn!("Max concurrency was set to 0. Setting to 1.");
        config.max_concurrency = 1;
    }
    if config.request_timeout.is_zero() {
        tracing::warn!("Request timeout was 0. Setting to 1s.");
        config.request_timeout = Duration::from_secs(1);
    }
    if config.probe_timeout.is_zero() {
        tracing::warn!("Probe timeout was 0. Setting to 1s.");
        config.probe_timeout = Duration::from_secs(1);
    }
    if config.browser_timeout.is_zero() {
        return Err(AppError::Config(
            "Browser timeout must be greater than zero.".to_string(),
        ));
    }
    if config.webdriver_url.trim().is_empty() {
        return Err(AppError::Config(
            "WebDriver URL must not be empty.".to_string(),
        ));
    }
    if config.enable_mailto {
        if config.smtp_relay.is_none() {
            tracing::warn!(
                "Mailto channel enabled but no SMTP relay configured. Disabling mailto channel."
            );
            config.enable_mailto = false;
        } else if !config.smtp_sender_email.contains('@') || !config.smtp_sender_email.contains('.')
        {
            return Err(AppError::Config(format!(
                "Invalid SMTP sender email format: {}",
                config.smtp_sender_email
            )));
        }
    }
    if config.label_action.trim().is_empty()
        || config.label_unsubscribed.trim().is_empty()
        || config.label_failed.trim().is_empty()
    {
        return Err(AppError::Config(
            "Label names must not be empty.".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let mut config = Config::default();
        assert!(validate_config(&mut config).is_ok());
        // Mailto is on by default but requires a relay.
        assert!(!config.enable_mailto);
    }

    #[test]
    fn test_zero_values_clamped() {
        let mut config = Config {
            max_concurrency: 0,
            request_timeout: Duration::from_secs(0),
            ..Config::default()
        };
        validate_config(&mut config).unwrap();
        assert_eq!(config.max_concurrency, 1);
        assert_eq!(config.request_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_mailto_requires_valid_sender() {
        let mut config = Config {
            smtp_relay: Some("smtp.example.com".to_string()),
            smtp_sender_email: "not-an-address".to_string(),
            ..Config::default()
        };
        assert!(validate_config(&mut config).is_err());

        config.smtp_sender_email = "me@example.com".to_string();
        validate_config(&mut config).unwrap();
        assert!(config.enable_mailto);
    }

    #[test]
    fn test_empty_webdriver_url_rejected() {
        let mut config = Config {
            webdriver_url: "  ".to_string(),
            ..Config::default()
        };
        assert!(validate_config(&mut config).is_err());
    }
}
