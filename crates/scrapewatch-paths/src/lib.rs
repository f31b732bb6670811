use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("home directory not found, set the $HOME environment variable")]
    HomeNotFound,
}

/// Path construction for the `~/.scrapewatch/` directory layout.
///
/// Use `resolve()` in production code and `from_dir()` in tests.
#[derive(Debug, Clone)]
pub struct ScrapewatchPaths {
    base_dir: PathBuf,
}

impl ScrapewatchPaths {
    /// Resolve paths from the user's home directory (`~/.scrapewatch`).
    pub fn resolve() -> Result<Self, PathError> {
        let home = dirs::home_dir().ok_or(PathError::HomeNotFound)?;
        Ok(Self {
            base_dir: home.join(".scrapewatch"),
        })
    }

    /// Create paths from an explicit base directory. Use in tests.
    pub fn from_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// The base `~/.scrapewatch` directory.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn user_config(&self) -> PathBuf {
        self.base_dir.join("config.toml")
    }

    /// Project-level config: `<project_root>/.scrapewatch/config.toml`.
    pub fn project_config(project_root: &Path) -> PathBuf {
        project_root.join(".scrapewatch").join("config.toml")
    }
}
