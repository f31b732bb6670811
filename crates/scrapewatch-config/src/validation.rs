//! Configuration validation logic.

use crate::errors::ConfigError;
use crate::types::ScrapewatchConfig;

fn invalid(message: String) -> ConfigError {
    ConfigError::InvalidConfiguration { message }
}

fn check_url(field: &str, value: &str, schemes: &[&str]) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(value)
        .map_err(|e| invalid(format!("{} '{}' is not a valid URL: {}", field, value, e)))?;
    if !schemes.contains(&parsed.scheme()) {
        return Err(invalid(format!(
            "{} '{}' must use one of: {}",
            field,
            value,
            schemes.join(", ")
        )));
    }
    Ok(())
}

/// Validate a ScrapewatchConfig, returning an error if any values are invalid.
///
/// # Validation Rules
///
/// - `api.base_url` must be an http(s) URL
/// - `channel.url` must be a ws(s) URL
/// - `list.page_size` and `cache.ttl_secs` must be non-zero
/// - the reconnect min delay must not exceed the max delay
pub fn validate_config(config: &ScrapewatchConfig) -> Result<(), ConfigError> {
    check_url("api.base_url", config.api.base_url(), &["http", "https"])?;
    check_url("channel.url", config.channel.url(), &["ws", "wss"])?;

    if config.list.page_size() == 0 {
        return Err(invalid("list.page_size must be at least 1".to_string()));
    }

    if config.cache.ttl().is_zero() {
        return Err(invalid("cache.ttl_secs must be at least 1".to_string()));
    }

    if config.channel.reconnect_min_delay() > config.channel.reconnect_max_delay() {
        return Err(invalid(format!(
            "channel.reconnect_min_delay_ms ({}) exceeds reconnect_max_delay_ms ({})",
            config.channel.reconnect_min_delay().as_millis(),
            config.channel.reconnect_max_delay().as_millis()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ScrapewatchConfig::default()).is_ok());
    }

    #[test]
    fn test_rejects_websocket_scheme_for_api() {
        let mut config = ScrapewatchConfig::default();
        config.api.base_url = Some("ws://localhost:5000/api".to_string());
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_rejects_zero_page_size() {
        let mut config = ScrapewatchConfig::default();
        config.list.page_size = Some(0);
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_rejects_inverted_reconnect_delays() {
        let mut config = ScrapewatchConfig::default();
        config.channel.reconnect_min_delay_ms = Some(10_000);
        config.channel.reconnect_max_delay_ms = Some(1_000);
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }
}
