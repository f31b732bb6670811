use scrapewatch_protocol::{ItemStatus, ProfileCategory, SortOrder};

pub const DEFAULT_LIMIT: u32 = 20;
pub const DEFAULT_SORT_BY: &str = "createdAt";

/// The constraints one list view is bound to.
///
/// `page` is 0-based here; the API client converts it for the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilterSet {
    pub category: ProfileCategory,
    pub depth: Option<u32>,
    pub status: Option<ItemStatus>,
    pub search: String,
    pub page: u32,
    pub limit: u32,
    pub sort_by: String,
    pub sort_order: SortOrder,
}

impl Default for FilterSet {
    fn default() -> Self {
        Self {
            category: ProfileCategory::All,
            depth: None,
            status: None,
            search: String::new(),
            page: 0,
            limit: DEFAULT_LIMIT,
            sort_by: DEFAULT_SORT_BY.to_string(),
            sort_order: SortOrder::Desc,
        }
    }
}

/// A single filter edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterUpdate {
    Category(ProfileCategory),
    Depth(Option<u32>),
    Status(Option<ItemStatus>),
    Search(String),
    Page(u32),
    Limit(u32),
    Sort { by: String, order: SortOrder },
}

impl FilterUpdate {
    pub fn is_page(&self) -> bool {
        matches!(self, FilterUpdate::Page(_))
    }

    pub fn is_search(&self) -> bool {
        matches!(self, FilterUpdate::Search(_))
    }
}

impl FilterSet {
    pub fn with_limit(limit: u32) -> Self {
        Self {
            limit: limit.max(1),
            ..Self::default()
        }
    }

    /// Apply `update`. Every edit except a page change returns to page 0.
    pub fn apply(&mut self, update: FilterUpdate) {
        match update {
            FilterUpdate::Page(page) => {
                self.page = page;
                return;
            }
            FilterUpdate::Category(category) => self.category = category,
            FilterUpdate::Depth(depth) => self.depth = depth,
            FilterUpdate::Status(status) => self.status = status,
            FilterUpdate::Search(search) => self.search = search,
            FilterUpdate::Limit(limit) => self.limit = limit.max(1),
            FilterUpdate::Sort { by, order } => {
                self.sort_by = by;
                self.sort_order = order;
            }
        }
        self.page = 0;
    }

    pub fn has_search(&self) -> bool {
        !self.search.trim().is_empty()
    }

    /// Deterministic identity used for caching and staleness checks.
    pub fn cache_key(&self) -> String {
        format!(
            "{}-depth-{}-status-{}-search-{}-sort-{}-{}-limit-{}-page-{}",
            self.category,
            self.depth.map_or_else(|| "all".to_string(), |d| d.to_string()),
            self.status.map_or("all", |s| s.as_wire_str()),
            self.search,
            self.sort_by,
            self.sort_order,
            self.limit,
            self.page,
        )
    }

    /// Prefix shared by every page of this filter's category.
    pub fn context_prefix(&self) -> String {
        format!("{}-", self.category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_is_deterministic() {
        let filter = FilterSet {
            category: ProfileCategory::Root,
            depth: Some(0),
            status: Some(ItemStatus::Failed),
            ..FilterSet::default()
        };
        assert_eq!(
            filter.cache_key(),
            "root-depth-0-status-failed-search--sort-createdAt-desc-limit-20-page-0"
        );
        assert_eq!(filter.cache_key(), filter.clone().cache_key());
        assert!(filter.cache_key().starts_with(&filter.context_prefix()));
    }

    #[test]
    fn test_unset_constraints_render_as_all() {
        let key = FilterSet::default().cache_key();
        assert!(key.starts_with("all-depth-all-status-all-"));
    }

    #[test]
    fn test_every_edit_but_page_resets_page() {
        let mut filter = FilterSet::default();
        filter.apply(FilterUpdate::Page(3));
        assert_eq!(filter.page, 3);

        filter.apply(FilterUpdate::Depth(Some(2)));
        assert_eq!(filter.page, 0);

        filter.apply(FilterUpdate::Page(1));
        filter.apply(FilterUpdate::Search("alice".to_string()));
        assert_eq!(filter.page, 0);

        filter.apply(FilterUpdate::Page(4));
        filter.apply(FilterUpdate::Sort {
            by: "username".to_string(),
            order: SortOrder::Asc,
        });
        assert_eq!(filter.page, 0);
    }

    #[test]
    fn test_zero_limit_is_clamped() {
        let mut filter = FilterSet::with_limit(0);
        assert_eq!(filter.limit, 1);
        filter.apply(FilterUpdate::Limit(0));
        assert_eq!(filter.limit, 1);
    }

    #[test]
    fn test_whitespace_search_is_not_a_search() {
        let mut filter = FilterSet::default();
        filter.apply(FilterUpdate::Search("   ".to_string()));
        assert!(!filter.has_search());
    }
}
