use serde::{Deserialize, Serialize};

/// Backend identifier of a scraping session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::ops::Deref for SessionId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A topic of interest on the event channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Subject {
    Session(SessionId),
    System,
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Subject::Session(id) => write!(f, "session:{}", id),
            Subject::System => write!(f, "system"),
        }
    }
}

/// Lifecycle status of a single scraped profile.
///
/// The backend reports `scraping` for in-flight work and `scraped` for
/// success; both spellings of each state are accepted.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    #[default]
    Pending,
    #[serde(alias = "scraping")]
    Processing,
    #[serde(rename = "scraped", alias = "succeeded")]
    Succeeded,
    Failed,
    #[serde(other)]
    Unknown,
}

impl ItemStatus {
    /// Spelling used in query parameters and cache keys.
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Processing => "processing",
            ItemStatus::Succeeded => "scraped",
            ItemStatus::Failed => "failed",
            ItemStatus::Unknown => "unknown",
        }
    }

    /// Whether the item has left the pending/processing pipeline.
    pub fn is_settled(&self) -> bool {
        matches!(self, ItemStatus::Succeeded | ItemStatus::Failed)
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_wire_str())
    }
}

impl std::str::FromStr for ItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ItemStatus::Pending),
            "processing" | "scraping" => Ok(ItemStatus::Processing),
            "scraped" | "succeeded" => Ok(ItemStatus::Succeeded),
            "failed" => Ok(ItemStatus::Failed),
            other => Err(format!(
                "unknown status '{}', expected one of: pending, processing, scraped, failed",
                other
            )),
        }
    }
}

/// Lifecycle status of a scraping session.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Stopped,
    #[serde(other)]
    Unknown,
}

impl SessionStatus {
    /// Running sessions must be stopped before they can be deleted.
    pub fn is_running(&self) -> bool {
        matches!(self, SessionStatus::Running)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::Failed | SessionStatus::Stopped
        )
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Pending => write!(f, "pending"),
            SessionStatus::Running => write!(f, "running"),
            SessionStatus::Paused => write!(f, "paused"),
            SessionStatus::Completed => write!(f, "completed"),
            SessionStatus::Failed => write!(f, "failed"),
            SessionStatus::Stopped => write!(f, "stopped"),
            SessionStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Which slice of the profile collection a list shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileCategory {
    #[default]
    All,
    Root,
    Related,
    Analyzed,
}

impl ProfileCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileCategory::All => "all",
            ProfileCategory::Root => "root",
            ProfileCategory::Related => "related",
            ProfileCategory::Analyzed => "analyzed",
        }
    }
}

impl std::fmt::Display for ProfileCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProfileCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(ProfileCategory::All),
            "root" => Ok(ProfileCategory::Root),
            "related" => Ok(ProfileCategory::Related),
            "analyzed" => Ok(ProfileCategory::Analyzed),
            other => Err(format!(
                "unknown profile type '{}', expected one of: all, root, related, analyzed",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
