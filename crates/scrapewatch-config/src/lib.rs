//! # scrapewatch-config
//!
//! TOML configuration types, loading, and validation for scrapewatch.
//!
//! Single source of truth for `ScrapewatchConfig` and its sections.
//! Depends only on `scrapewatch-paths`.

mod defaults;
mod loading;
mod validation;

pub mod errors;
pub mod types;

pub use errors::ConfigError;
pub use loading::{load_config_file, load_hierarchy, merge_configs};
pub use types::{
    ApiConfig, CacheConfig, ChannelConfig, ListConfig, MonitorConfig, NotifyConfig,
    ScrapewatchConfig, SystemConfig,
};
pub use validation::validate_config;

impl ScrapewatchConfig {
    /// Load configuration from the hierarchy of config files.
    ///
    /// See [`loading::load_hierarchy`] for details.
    pub fn load_hierarchy() -> Result<Self, ConfigError> {
        loading::load_hierarchy()
    }

    /// Validate the configuration.
    ///
    /// See [`validation::validate_config`] for details.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validation::validate_config(self)
    }
}
