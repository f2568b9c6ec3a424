//! Configuration validation utilities.

use std::net::SocketAddr;

use super::error::{ConfigError, ConfigResult};
use super::schema::{
    BotConfig, CourierConfig, LongPollConfig, RetrySettings, SourceConfig, WebhookConfig,
};

/// Largest `limit` accepted by `getUpdates`.
const MAX_POLL_LIMIT: u32 = 100;

/// Validates the entire configuration.
pub fn validate_config(config: &CourierConfig) -> ConfigResult<()> {
    validate_bot_config(&config.bot)?;
    match &config.source {
        SourceConfig::LongPoll(poll) => validate_long_poll_config(poll, &config.bot),
        SourceConfig::Webhook(webhook) => validate_webhook_config(webhook),
    }
}

fn validate_bot_config(bot: &BotConfig) -> ConfigResult<()> {
    if bot.api_token.trim().is_empty() {
        return Err(ConfigError::missing_field("bot.api_token"));
    }

    validate_http_url(&bot.api_url)?;

    if bot.request_timeout_secs == 0 {
        return Err(ConfigError::validation(
            "Request timeout must be greater than 0",
        ));
    }

    Ok(())
}

fn validate_long_poll_config(poll: &LongPollConfig, bot: &BotConfig) -> ConfigResult<()> {
    if poll.limit == 0 || poll.limit > MAX_POLL_LIMIT {
        return Err(ConfigError::validation(format!(
            "Poll limit must be between 1 and {MAX_POLL_LIMIT}, got {}",
            poll.limit
        )));
    }

    // The HTTP request has to outlive the server-side wait.
    if poll.timeout_secs >= bot.request_timeout_secs {
        return Err(ConfigError::validation(format!(
            "Poll timeout ({}s) must be shorter than the request timeout ({}s)",
            poll.timeout_secs, bot.request_timeout_secs
        )));
    }

    validate_retry_settings(&poll.retry)
}

fn validate_retry_settings(retry: &RetrySettings) -> ConfigResult<()> {
    if retry.initial_delay_ms == 0 {
        return Err(ConfigError::validation(
            "Initial retry delay must be greater than 0",
        ));
    }

    if retry.max_delay_ms < retry.initial_delay_ms {
        return Err(ConfigError::validation(
            "Max retry delay must be greater than or equal to initial delay",
        ));
    }

    if retry.backoff_multiplier < 1.0 {
        return Err(ConfigError::validation(
            "Backoff multiplier must be at least 1.0",
        ));
    }

    Ok(())
}

fn validate_webhook_config(webhook: &WebhookConfig) -> ConfigResult<()> {
    if webhook.url.is_empty() {
        return Err(ConfigError::missing_field("source.url"));
    }
    validate_http_url(&webhook.url)?;

    if webhook.listen.parse::<SocketAddr>().is_err() {
        return Err(ConfigError::validation(format!(
            "Invalid listen address: {}",
            webhook.listen
        )));
    }

    if let Some(path) = &webhook.path {
        validate_path(path)?;
    }

    Ok(())
}

fn validate_http_url(url: &str) -> ConfigResult<()> {
    let Some((scheme, rest)) = url.split_once("://") else {
        return Err(ConfigError::invalid_url(url, "missing scheme"));
    };
    if scheme != "http" && scheme != "https" {
        return Err(ConfigError::invalid_url(
            url,
            format!("expected http or https, got {scheme}"),
        ));
    }
    if rest.is_empty() || rest.starts_with('/') {
        return Err(ConfigError::invalid_url(url, "missing host"));
    }
    Ok(())
}

fn validate_path(path: &str) -> ConfigResult<()> {
    if !path.starts_with('/') {
        return Err(ConfigError::validation(format!(
            "Path must start with '/': {path}"
        )));
    }
    // Mounted as a static route.
    if path.contains(['{', '}']) || path.contains("/:") || path.contains("/*") {
        return Err(ConfigError::validation(format!(
            "Path must not contain route parameters: {path}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> CourierConfig {
        let mut config = CourierConfig::default();
        config.bot.api_token = "123:abc".into();
        config
    }

    #[test]
    fn test_validate_defaults_with_token() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn test_validate_missing_token() {
        let err = validate_config(&CourierConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field } if field == "bot.api_token"));
    }

    #[test]
    fn test_validate_api_url() {
        let mut config = valid();
        config.bot.api_url = "ftp://api.example.com".into();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidUrl { .. })
        ));

        config.bot.api_url = "http://localhost:8081".into();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_poll_limits() {
        let mut config = valid();
        let SourceConfig::LongPoll(poll) = &mut config.source else {
            unreachable!()
        };
        poll.limit = 0;
        assert!(validate_config(&config).is_err());

        let SourceConfig::LongPoll(poll) = &mut config.source else {
            unreachable!()
        };
        poll.limit = 100;
        poll.timeout_secs = 60;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("request timeout"));
    }

    #[test]
    fn test_validate_retry_settings() {
        let mut config = valid();
        let SourceConfig::LongPoll(poll) = &mut config.source else {
            unreachable!()
        };
        poll.retry.backoff_multiplier = 0.5;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_webhook() {
        let mut config = valid();
        config.source = SourceConfig::Webhook(WebhookConfig {
            url: "https://example.com/hook".into(),
            ..Default::default()
        });
        assert!(validate_config(&config).is_ok());

        config.source = SourceConfig::Webhook(WebhookConfig {
            url: "https://example.com/hook".into(),
            listen: "not-an-addr".into(),
            ..Default::default()
        });
        assert!(validate_config(&config).is_err());

        config.source = SourceConfig::Webhook(WebhookConfig {
            url: "https://example.com/hook".into(),
            path: Some("hook".into()),
            ..Default::default()
        });
        assert!(validate_config(&config).is_err());

        config.source = SourceConfig::Webhook(WebhookConfig {
            url: "https://example.com/hook".into(),
            path: Some("/hook/{id}".into()),
            ..Default::default()
        });
        assert!(validate_config(&config).is_err());

        config.source = SourceConfig::Webhook(WebhookConfig::default());
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { .. })
        ));
    }
}
