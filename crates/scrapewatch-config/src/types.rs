//! Configuration type definitions for scrapewatch.
//!
//! # Example Configuration
//!
//! ```toml
//! [api]
//! base_url = "https://scraper.internal/api"
//!
//! [channel]
//! url = "wss://scraper.internal/ws"
//! max_reconnect_attempts = 8
//!
//! [cache]
//! ttl_secs = 120
//!
//! [list]
//! page_size = 50
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults;

/// Main configuration loaded from TOML config files.
///
/// Loaded from:
/// 1. User config: `~/.scrapewatch/config.toml`
/// 2. Project config: `./.scrapewatch/config.toml`
///
/// Project config values override user config values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrapewatchConfig {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub channel: ChannelConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub list: ListConfig,

    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub system: SystemConfig,

    #[serde(default)]
    pub notify: NotifyConfig,
}

/// `[api]` section: the REST backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL every endpoint path is appended to.
    /// Default: `"http://localhost:5000/api"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl ApiConfig {
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(defaults::API_BASE_URL)
    }

    pub fn merge(base: &Self, override_config: &Self) -> Self {
        Self {
            base_url: override_config.base_url.clone().or(base.base_url.clone()),
        }
    }
}

/// `[channel]` section: the push-event connection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// WebSocket endpoint. Default: `"ws://localhost:5000/ws"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Automatic reconnect attempts before the channel reports a fatal error.
    /// Default: 5
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_reconnect_attempts: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconnect_min_delay_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconnect_max_delay_ms: Option<u64>,
}

impl ChannelConfig {
    pub fn url(&self) -> &str {
        self.url.as_deref().unwrap_or(defaults::CHANNEL_URL)
    }

    pub fn max_reconnect_attempts(&self) -> u32 {
        self.max_reconnect_attempts
            .unwrap_or(defaults::MAX_RECONNECT_ATTEMPTS)
    }

    pub fn reconnect_min_delay(&self) -> Duration {
        Duration::from_millis(
            self.reconnect_min_delay_ms
                .unwrap_or(defaults::RECONNECT_MIN_DELAY_MS),
        )
    }

    pub fn reconnect_max_delay(&self) -> Duration {
        Duration::from_millis(
            self.reconnect_max_delay_ms
                .unwrap_or(defaults::RECONNECT_MAX_DELAY_MS),
        )
    }

    pub fn merge(base: &Self, override_config: &Self) -> Self {
        Self {
            url: override_config.url.clone().or(base.url.clone()),
            max_reconnect_attempts: override_config
                .max_reconnect_attempts
                .or(base.max_reconnect_attempts),
            reconnect_min_delay_ms: override_config
                .reconnect_min_delay_ms
                .or(base.reconnect_min_delay_ms),
            reconnect_max_delay_ms: override_config
                .reconnect_max_delay_ms
                .or(base.reconnect_max_delay_ms),
        }
    }
}

/// `[cache]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Lifetime of a cached list page. Default: 300
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u64>,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs.unwrap_or(defaults::CACHE_TTL_SECS))
    }

    pub fn merge(base: &Self, override_config: &Self) -> Self {
        Self {
            ttl_secs: override_config.ttl_secs.or(base.ttl_secs),
        }
    }
}

/// `[list]` section: profile table paging and filter debouncing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ListConfig {
    /// Rows per page. Default: 20
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,

    /// Settle time for depth/status/type filter edits. Default: 100
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_debounce_ms: Option<u64>,

    /// Settle time for free-text search edits. Default: 300
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_debounce_ms: Option<u64>,
}

impl ListConfig {
    pub fn page_size(&self) -> u32 {
        self.page_size.unwrap_or(defaults::PAGE_SIZE)
    }

    pub fn filter_debounce(&self) -> Duration {
        Duration::from_millis(
            self.filter_debounce_ms
                .unwrap_or(defaults::FILTER_DEBOUNCE_MS),
        )
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(
            self.search_debounce_ms
                .unwrap_or(defaults::SEARCH_DEBOUNCE_MS),
        )
    }

    pub fn merge(base: &Self, override_config: &Self) -> Self {
        Self {
            page_size: override_config.page_size.or(base.page_size),
            filter_debounce_ms: override_config
                .filter_debounce_ms
                .or(base.filter_debounce_ms),
            search_debounce_ms: override_config
                .search_debounce_ms
                .or(base.search_debounce_ms),
        }
    }
}

/// `[monitor]` section: session monitoring timers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Default: 500
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_debounce_ms: Option<u64>,

    /// Window over which item status updates are batched. Default: 1000
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_batch_ms: Option<u64>,

    /// Length of the recent-activity list. Default: 10
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recent_limit: Option<usize>,
}

impl MonitorConfig {
    pub fn progress_debounce(&self) -> Duration {
        Duration::from_millis(
            self.progress_debounce_ms
                .unwrap_or(defaults::PROGRESS_DEBOUNCE_MS),
        )
    }

    pub fn status_batch_window(&self) -> Duration {
        Duration::from_millis(self.status_batch_ms.unwrap_or(defaults::STATUS_BATCH_MS))
    }

    pub fn recent_limit(&self) -> usize {
        self.recent_limit.unwrap_or(defaults::RECENT_LIMIT)
    }

    pub fn merge(base: &Self, override_config: &Self) -> Self {
        Self {
            progress_debounce_ms: override_config
                .progress_debounce_ms
                .or(base.progress_debounce_ms),
            status_batch_ms: override_config.status_batch_ms.or(base.status_batch_ms),
            recent_limit: override_config.recent_limit.or(base.recent_limit),
        }
    }
}

/// `[system]` section: system-wide analytics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Default: 30
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_interval_secs: Option<u64>,

    /// Default: 50
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_limit: Option<usize>,
}

impl SystemConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(
            self.refresh_interval_secs
                .unwrap_or(defaults::SYSTEM_REFRESH_INTERVAL_SECS),
        )
    }

    pub fn activity_limit(&self) -> usize {
        self.activity_limit.unwrap_or(defaults::ACTIVITY_LIMIT)
    }

    pub fn merge(base: &Self, override_config: &Self) -> Self {
        Self {
            refresh_interval_secs: override_config
                .refresh_interval_secs
                .or(base.refresh_interval_secs),
            activity_limit: override_config.activity_limit.or(base.activity_limit),
        }
    }
}

/// `[notify]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Auto-dismiss time for a notification. Default: 5000
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_duration_ms: Option<u64>,
}

impl NotifyConfig {
    pub fn default_duration(&self) -> Duration {
        Duration::from_millis(
            self.default_duration_ms
                .unwrap_or(defaults::NOTIFICATION_DURATION_MS),
        )
    }

    pub fn merge(base: &Self, override_config: &Self) -> Self {
        Self {
            default_duration_ms: override_config
                .default_duration_ms
                .or(base.default_duration_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: ScrapewatchConfig = toml::from_str("").unwrap();
        assert_eq!(config.api.base_url(), "http://localhost:5000/api");
        assert_eq!(config.channel.max_reconnect_attempts(), 5);
        assert_eq!(config.cache.ttl(), Duration::from_secs(300));
        assert_eq!(config.list.page_size(), 20);
        assert_eq!(config.list.filter_debounce(), Duration::from_millis(100));
        assert_eq!(config.list.search_debounce(), Duration::from_millis(300));
        assert_eq!(config.monitor.status_batch_window(), Duration::from_secs(1));
        assert_eq!(config.monitor.recent_limit(), 10);
        assert_eq!(config.notify.default_duration(), Duration::from_millis(5000));
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: ScrapewatchConfig = toml::from_str(
            r#"
            [channel]
            max_reconnect_attempts = 9
            "#,
        )
        .unwrap();
        assert_eq!(config.channel.max_reconnect_attempts(), 9);
        assert_eq!(config.channel.reconnect_max_delay(), Duration::from_secs(5));
    }

    #[test]
    fn test_unset_fields_are_not_serialized() {
        let config = ScrapewatchConfig::default();
        let out = toml::to_string(&config).unwrap();
        assert!(!out.contains("base_url"));
        assert!(!out.contains("ttl_secs"));
    }
}
