use std::collections::HashMap;

use scrapewatch_protocol::{ProfilePage, ProfileRecord};
use tracing::warn;

use crate::errors::SyncError;

/// What a list view renders: one page of rows plus status flags.
///
/// Rows are indexed by natural key so channel events can be correlated in
/// constant time. The index is rebuilt whenever the rows are replaced
/// wholesale and extended when a row is appended.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewState {
    items: Vec<ProfileRecord>,
    index: HashMap<String, usize>,
    pub total_count: u64,
    /// 0-based.
    pub page: u32,
    pub total_pages: u32,
    pub has_more: bool,
    /// First load of this list, nothing to show yet.
    pub loading: bool,
    /// Reloading behind rows that are still displayable.
    pub transitioning: bool,
    pub error: Option<SyncError>,
}

impl ViewState {
    pub fn from_page(page: ProfilePage) -> Self {
        let mut view = Self {
            items: page.profiles,
            index: HashMap::new(),
            total_count: page.total_count,
            page: page.page.saturating_sub(1),
            total_pages: page.total_pages,
            has_more: page.has_more,
            loading: false,
            transitioning: false,
            error: None,
        };
        view.rebuild_index();
        view
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        for (position, item) in self.items.iter().enumerate() {
            let Some(key) = item.natural_key() else {
                continue;
            };
            if self.index.contains_key(key) {
                warn!(event = "core.list.duplicate_key_skipped", key = key);
                continue;
            }
            self.index.insert(key.to_string(), position);
        }
    }

    pub fn items(&self) -> &[ProfileRecord] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn position(&self, natural_key: &str) -> Option<usize> {
        self.index.get(natural_key).copied()
    }

    pub fn get(&self, natural_key: &str) -> Option<&ProfileRecord> {
        self.position(natural_key).map(|i| &self.items[i])
    }

    /// Either load flag is set.
    pub fn is_busy(&self) -> bool {
        self.loading || self.transitioning
    }

    pub(crate) fn item_mut(&mut self, position: usize) -> Option<&mut ProfileRecord> {
        self.items.get_mut(position)
    }

    /// Append a row that is not yet on the page and count it.
    pub(crate) fn push(&mut self, item: ProfileRecord) {
        if let Some(key) = item.natural_key() {
            self.index.insert(key.to_string(), self.items.len());
        }
        self.items.push(item);
        self.total_count += 1;
    }

    /// Copy suitable for the cache: data only, no transient flags.
    pub(crate) fn settled(&self) -> Self {
        Self {
            loading: false,
            transitioning: false,
            error: None,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(url: &str) -> ProfileRecord {
        ProfileRecord {
            profile_url: Some(url.to_string()),
            ..ProfileRecord::default()
        }
    }

    #[test]
    fn test_from_page_indexes_by_natural_key() {
        let view = ViewState::from_page(ProfilePage {
            profiles: vec![record("https://instagram.com/a"), record("https://instagram.com/b")],
            total_count: 2,
            page: 1,
            limit: 20,
            total_pages: 1,
            has_more: false,
        });

        assert_eq!(view.page, 0);
        assert_eq!(view.position("https://instagram.com/b"), Some(1));
        assert!(view.get("https://instagram.com/z").is_none());
    }

    #[test]
    fn test_duplicate_keys_keep_first_row() {
        let mut first = record("https://instagram.com/a");
        first.id = Some("1".to_string());
        let mut second = record("https://instagram.com/a");
        second.id = Some("2".to_string());

        let view = ViewState::from_page(ProfilePage {
            profiles: vec![first, second],
            ..ProfilePage::default()
        });
        assert_eq!(view.get("https://instagram.com/a").and_then(|r| r.id.as_deref()), Some("1"));
    }

    #[test]
    fn test_push_extends_index_and_count() {
        let mut view = ViewState::default();
        view.push(record("https://instagram.com/new"));
        assert_eq!(view.total_count, 1);
        assert_eq!(view.position("https://instagram.com/new"), Some(0));
    }

    #[test]
    fn test_settled_drops_flags() {
        let view = ViewState {
            loading: true,
            error: Some(SyncError::Canceled),
            ..ViewState::default()
        };
        let settled = view.settled();
        assert!(!settled.is_busy());
        assert!(settled.error.is_none());
    }
}
