//! Configuration loading and merging logic.
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded in the following order (later sources override earlier ones):
//! 1. **Hardcoded defaults** - Built-in fallback values
//! 2. **User config** - `~/.scrapewatch/config.toml`
//! 3. **Project config** - `./.scrapewatch/config.toml`
//! 4. **Environment** - `SCRAPEWATCH_API_URL`, `SCRAPEWATCH_WS_URL`
//! 5. **CLI arguments** - Command-line flags (highest priority, applied by the caller)

use std::fs;
use std::path::Path;

use scrapewatch_paths::ScrapewatchPaths;
use tracing::debug;

use crate::errors::ConfigError;
use crate::types::{
    ApiConfig, CacheConfig, ChannelConfig, ListConfig, MonitorConfig, NotifyConfig,
    ScrapewatchConfig, SystemConfig,
};
use crate::validation::validate_config;

pub const API_URL_ENV: &str = "SCRAPEWATCH_API_URL";
pub const WS_URL_ENV: &str = "SCRAPEWATCH_WS_URL";

fn is_file_not_found(e: &ConfigError) -> bool {
    matches!(e, ConfigError::IoError { source } if source.kind() == std::io::ErrorKind::NotFound)
}

/// Load configuration from the hierarchy of config files.
///
/// # Errors
///
/// Returns an error if a config file exists but cannot be parsed, or if the
/// merged result fails validation. Missing config files are not errors.
pub fn load_hierarchy() -> Result<ScrapewatchConfig, ConfigError> {
    let mut config = ScrapewatchConfig::default();

    match ScrapewatchPaths::resolve() {
        Ok(paths) => match load_config_file(&paths.user_config()) {
            Ok(user_config) => config = merge_configs(config, user_config),
            Err(e) if !is_file_not_found(&e) => return Err(e),
            Err(_) => debug!(event = "config.user.not_found"),
        },
        Err(e) => debug!(event = "config.user.skipped", reason = %e),
    }

    let project_root = std::env::current_dir()?;
    match load_config_file(&ScrapewatchPaths::project_config(&project_root)) {
        Ok(project_config) => config = merge_configs(config, project_config),
        Err(e) if !is_file_not_found(&e) => return Err(e),
        Err(_) => debug!(event = "config.project.not_found"),
    }

    apply_env_overrides(&mut config);

    validate_config(&config)?;

    Ok(config)
}

/// Load a single configuration file.
pub fn load_config_file(path: &Path) -> Result<ScrapewatchConfig, ConfigError> {
    let content = fs::read_to_string(path)
        .map_err(|e| std::io::Error::new(e.kind(), format!("'{}': {}", path.display(), e)))?;
    toml::from_str(&content).map_err(|e| ConfigError::ConfigParseError {
        message: format!("'{}': {}", path.display(), e),
    })
}

fn apply_env_overrides(config: &mut ScrapewatchConfig) {
    if let Ok(url) = std::env::var(API_URL_ENV)
        && !url.is_empty()
    {
        config.api.base_url = Some(url);
    }
    if let Ok(url) = std::env::var(WS_URL_ENV)
        && !url.is_empty()
    {
        config.channel.url = Some(url);
    }
}

/// Merge two configurations, with override_config taking precedence.
///
/// Override values replace base values only if present.
pub fn merge_configs(
    base: ScrapewatchConfig,
    override_config: ScrapewatchConfig,
) -> ScrapewatchConfig {
    ScrapewatchConfig {
        api: ApiConfig::merge(&base.api, &override_config.api),
        channel: ChannelConfig::merge(&base.channel, &override_config.channel),
        cache: CacheConfig::merge(&base.cache, &override_config.cache),
        list: ListConfig::merge(&base.list, &override_config.list),
        monitor: MonitorConfig::merge(&base.monitor, &override_config.monitor),
        system: SystemConfig::merge(&base.system, &override_config.system),
        notify: NotifyConfig::merge(&base.notify, &override_config.notify),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_merge_override_wins_only_when_set() {
        let mut base = ScrapewatchConfig::default();
        base.api.base_url = Some("http://base/api".to_string());
        base.list.page_size = Some(50);

        let mut project = ScrapewatchConfig::default();
        project.list.page_size = Some(10);

        let merged = merge_configs(base, project);
        assert_eq!(merged.api.base_url(), "http://base/api");
        assert_eq!(merged.list.page_size(), 10);
    }

    #[test]
    fn test_load_config_file_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[list\npage_size = ").unwrap();

        let result = load_config_file(&path);
        assert!(matches!(result, Err(ConfigError::ConfigParseError { .. })));
    }

    #[test]
    fn test_load_config_file_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(is_file_not_found(&err));
    }

    #[test]
    fn test_load_hierarchy_reads_user_config_and_env() {
        let home = tempfile::tempdir().unwrap();
        let config_dir = home.path().join(".scrapewatch");
        fs::create_dir_all(&config_dir).unwrap();
        fs::write(
            config_dir.join("config.toml"),
            "[cache]\nttl_secs = 60\n\n[api]\nbase_url = \"http://from-file/api\"\n",
        )
        .unwrap();

        temp_env::with_vars(
            [
                ("HOME", Some(home.path().to_str().unwrap())),
                (API_URL_ENV, Some("http://from-env/api")),
                (WS_URL_ENV, None),
            ],
            || {
                let config = load_hierarchy().unwrap();
                assert_eq!(config.cache.ttl(), Duration::from_secs(60));
                assert_eq!(config.api.base_url(), "http://from-env/api");
            },
        );
    }
}
