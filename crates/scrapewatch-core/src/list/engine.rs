use std::sync::Arc;
use std::time::{Duration, Instant};

use scrapewatch_config::ScrapewatchConfig;
use scrapewatch_protocol::{
    ChannelEvent, ItemStatus, ProfileCategory, ProfilePage, ProfileRecord, SessionId,
};
use tracing::{debug, info, warn};

use crate::cache::{FetchOutcome, RequestTicket, RequestTracker, Settle, TtlCache};
use crate::clock::{TimerClass, TimerKey, TimerTable};
use crate::errors::SyncError;

use super::filter::{FilterSet, FilterUpdate};
use super::view::ViewState;

/// Timing knobs for one list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListSettings {
    pub cache_ttl: Duration,
    pub filter_debounce: Duration,
    pub search_debounce: Duration,
}

impl ListSettings {
    pub fn from_config(config: &ScrapewatchConfig) -> Self {
        Self {
            cache_ttl: config.cache.ttl(),
            filter_debounce: config.list.filter_debounce(),
            search_debounce: config.list.search_debounce(),
        }
    }
}

impl Default for ListSettings {
    fn default() -> Self {
        Self::from_config(&ScrapewatchConfig::default())
    }
}

/// How a load request was resolved.
#[derive(Debug, Clone)]
pub enum LoadDecision {
    /// A fresh snapshot was installed from the cache.
    CacheHit,
    /// The caller must fetch `filter` and report back with `ticket.seq`.
    Fetch {
        ticket: RequestTicket,
        filter: FilterSet,
    },
    /// The engine has been disposed.
    Disposed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutcome {
    Applied,
    /// A newer request was issued; nothing changed.
    Stale,
    Canceled,
    Failed(SyncError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    Disposed,
    NotAnItemEvent,
    NothingInstalled,
    OtherSession,
    FilterMismatch,
    MissingKey,
    /// Not on this page, and this event kind never adds rows.
    NotFound,
    PageFull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    Updated,
    Inserted,
    /// Matched a row that already reflects the event.
    Unchanged,
    Ignored(IgnoreReason),
}

#[derive(Debug, Clone)]
struct Installed {
    key: String,
    filter: FilterSet,
}

/// Fields an item-level event carries, borrowed from the event.
struct ItemPatch<'a> {
    session: &'a SessionId,
    id: Option<&'a str>,
    profile_url: Option<&'a str>,
    username: Option<&'a str>,
    depth: Option<u32>,
    status: ItemStatus,
    error: Option<&'a str>,
    timestamp: Option<&'a str>,
    scraped_at: Option<&'a str>,
    profile_data: Option<&'a serde_json::Value>,
    may_insert: bool,
}

impl<'a> ItemPatch<'a> {
    fn from_event(event: &'a ChannelEvent) -> Option<Self> {
        match event {
            ChannelEvent::ProfileStatusUpdate(update) => Some(Self {
                session: &update.session_id,
                id: update.id.as_deref(),
                profile_url: update.profile_url.as_deref(),
                username: update.username.as_deref(),
                depth: update.depth,
                status: update.status,
                error: update.error.as_deref(),
                timestamp: update.timestamp.as_deref(),
                scraped_at: match update.status {
                    ItemStatus::Succeeded => update.timestamp.as_deref(),
                    _ => None,
                },
                profile_data: None,
                may_insert: true,
            }),
            ChannelEvent::ProfileScraped(scraped) => Some(Self {
                session: &scraped.session_id,
                id: None,
                profile_url: scraped.profile_url.as_deref(),
                username: scraped.username.as_deref(),
                depth: scraped.depth,
                status: ItemStatus::Succeeded,
                error: None,
                timestamp: scraped.scraped_at.as_deref(),
                scraped_at: scraped.scraped_at.as_deref(),
                profile_data: scraped.profile_data.as_ref(),
                may_insert: false,
            }),
            ChannelEvent::ProfileFailed(failed) => Some(Self {
                session: &failed.session_id,
                id: None,
                profile_url: failed.profile_url.as_deref(),
                username: failed.username.as_deref(),
                depth: failed.depth,
                status: ItemStatus::Failed,
                error: failed.error.as_deref(),
                timestamp: None,
                scraped_at: None,
                profile_data: None,
                may_insert: false,
            }),
            _ => None,
        }
    }

    fn natural_key(&self) -> Option<&'a str> {
        self.profile_url.or(self.username)
    }

    fn matches(&self, filter: &FilterSet) -> bool {
        if filter.depth.is_some_and(|d| self.depth != Some(d)) {
            return false;
        }
        if filter.status.is_some_and(|s| self.status != s) {
            return false;
        }
        match filter.category {
            ProfileCategory::Root => self.depth == Some(0),
            ProfileCategory::Related => self.depth.is_some_and(|d| d >= 1),
            _ => true,
        }
    }

    fn changes(&self, item: &ProfileRecord) -> bool {
        item.status != self.status
            || self.error.is_some_and(|e| item.error.as_deref() != Some(e))
            || self.scraped_at.is_some_and(|t| item.scraped_at.as_deref() != Some(t))
            || self.profile_data.is_some_and(|d| item.profile_data.as_ref() != Some(d))
    }

    fn apply_to(&self, item: &mut ProfileRecord) {
        item.status = self.status;
        if let Some(error) = self.error {
            item.error = Some(error.to_string());
        }
        if let Some(scraped_at) = self.scraped_at {
            item.scraped_at = Some(scraped_at.to_string());
        }
        if let Some(data) = self.profile_data {
            item.profile_data = Some(data.clone());
        }
    }

    fn to_record(&self) -> ProfileRecord {
        ProfileRecord {
            id: self.id.map(str::to_string),
            profile_url: self.profile_url.map(str::to_string),
            username: self.username.map(str::to_string),
            session_id: Some(self.session.clone()),
            depth: self.depth,
            status: self.status,
            error: self.error.map(str::to_string),
            profile_data: self.profile_data.cloned(),
            created_at: self.timestamp.map(str::to_string),
            scraped_at: self.scraped_at.map(str::to_string),
            updated_at: None,
        }
    }
}

/// Synchronization state for one filtered, paginated list.
///
/// Sans-IO: the engine decides what to fetch and applies what comes back,
/// but never performs I/O or reads a clock. Callers pass `now` and perform
/// the fetches it asks for, reporting results through [`ListEngine::complete`].
///
/// The view is handed out as `Arc<ViewState>`. Operations that do not
/// change the view leave the `Arc` untouched, so callers can detect no-ops
/// with `Arc::ptr_eq`.
pub struct ListEngine {
    context: String,
    session: Option<SessionId>,
    settings: ListSettings,
    filter: FilterSet,
    installed: Option<Installed>,
    view: Arc<ViewState>,
    cache: TtlCache<Arc<ViewState>>,
    tracker: RequestTracker,
    pending: Option<(u64, FilterSet)>,
    timers: TimerTable<TimerKey>,
    ever_installed: bool,
    disposed: bool,
}

impl ListEngine {
    pub fn new(session: Option<SessionId>, filter: FilterSet, settings: ListSettings) -> Self {
        let context = match &session {
            Some(id) => format!("profiles:{}", id),
            None => "profiles".to_string(),
        };
        Self {
            context,
            session,
            settings,
            filter,
            installed: None,
            view: Arc::new(ViewState::default()),
            cache: TtlCache::new(settings.cache_ttl),
            tracker: RequestTracker::new(),
            pending: None,
            timers: TimerTable::new(),
            ever_installed: false,
            disposed: false,
        }
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn session(&self) -> Option<&SessionId> {
        self.session.as_ref()
    }

    pub fn view(&self) -> Arc<ViewState> {
        self.view.clone()
    }

    /// The filter the next load will use.
    pub fn filter(&self) -> &FilterSet {
        &self.filter
    }

    /// The filter the displayed rows were loaded for.
    pub fn installed_filter(&self) -> Option<&FilterSet> {
        self.installed.as_ref().map(|i| &i.filter)
    }

    pub fn has_pending_fetch(&self) -> bool {
        self.tracker.outstanding()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Whether `filter` has a cache entry, fresh or not yet swept.
    pub fn is_cached(&self, filter: &FilterSet) -> bool {
        self.cache.contains_key(&filter.cache_key())
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    fn timer(&self, class: TimerClass) -> TimerKey {
        (self.context.clone(), class)
    }

    fn cancel_debounce(&mut self) {
        let filter_key = self.timer(TimerClass::FilterDebounce);
        let search_key = self.timer(TimerClass::SearchDebounce);
        self.timers.cancel(&filter_key);
        self.timers.cancel(&search_key);
    }

    /// Load `filter` now, from the cache when possible.
    pub fn load(&mut self, filter: FilterSet, now: Instant) -> LoadDecision {
        if self.disposed {
            return LoadDecision::Disposed;
        }
        self.filter = filter;
        self.cancel_debounce();
        self.resolve(now, false)
    }

    /// Re-fetch the current filter, bypassing its cache entry. On the first
    /// page every cached page of the same category is dropped as well.
    pub fn refresh(&mut self, now: Instant) -> LoadDecision {
        if self.disposed {
            return LoadDecision::Disposed;
        }
        self.cache.evict(&self.filter.cache_key());
        if self.filter.page == 0 {
            let evicted = self.cache.evict_prefix(&self.filter.context_prefix());
            debug!(
                event = "core.list.prefix_evicted",
                context = %self.context,
                prefix = %self.filter.context_prefix(),
                evicted = evicted,
            );
        }
        self.cancel_debounce();
        self.resolve(now, true)
    }

    /// Drop every cached page, whatever its key.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
        info!(event = "core.list.cache_cleared", context = %self.context);
    }

    fn resolve(&mut self, now: Instant, force: bool) -> LoadDecision {
        let key = self.filter.cache_key();

        if !force
            && !self.filter.has_search()
            && let Some(snapshot) = self.cache.get(&key, now)
        {
            if let Some(seq) = self.tracker.cancel_all() {
                debug!(event = "core.list.fetch_superseded", context = %self.context, seq = seq);
            }
            self.pending = None;
            self.view = snapshot;
            self.installed = Some(Installed {
                key: key.clone(),
                filter: self.filter.clone(),
            });
            self.ever_installed = true;
            debug!(event = "core.list.cache_hit", context = %self.context, key = %key);
            return LoadDecision::CacheHit;
        }

        let ticket = self.tracker.begin();
        self.pending = Some((ticket.seq, self.filter.clone()));

        let first_load = !self.ever_installed;
        let view = Arc::make_mut(&mut self.view);
        view.loading = first_load;
        view.transitioning = !first_load;
        view.error = None;

        debug!(
            event = "core.list.fetch_started",
            context = %self.context,
            seq = ticket.seq,
            key = %key,
            forced = force,
        );
        LoadDecision::Fetch {
            ticket,
            filter: self.filter.clone(),
        }
    }

    fn clear_flags(&mut self) {
        if self.view.is_busy() {
            let view = Arc::make_mut(&mut self.view);
            view.loading = false;
            view.transitioning = false;
        }
    }

    fn install(&mut self, filter: FilterSet, page: ProfilePage, now: Instant) {
        let key = filter.cache_key();
        let view = Arc::new(ViewState::from_page(page));
        if !filter.has_search() {
            self.cache.put(key.clone(), view.clone(), now);
        }
        self.view = view;
        self.installed = Some(Installed { key, filter });
        self.ever_installed = true;
    }

    /// Report the result of the fetch issued with sequence number `seq`.
    pub fn complete(
        &mut self,
        seq: u64,
        outcome: FetchOutcome<ProfilePage, SyncError>,
        now: Instant,
    ) -> CompletionOutcome {
        if self.disposed {
            return CompletionOutcome::Canceled;
        }

        let result = match outcome {
            FetchOutcome::Canceled | FetchOutcome::Completed(Err(SyncError::Canceled)) => {
                if self.tracker.settle(seq) == Settle::Current {
                    self.pending = None;
                    self.clear_flags();
                }
                debug!(event = "core.list.fetch_canceled", context = %self.context, seq = seq);
                return CompletionOutcome::Canceled;
            }
            FetchOutcome::Completed(result) => result,
        };

        if self.tracker.settle(seq) == Settle::Stale {
            debug!(event = "core.list.fetch_stale", context = %self.context, seq = seq);
            return CompletionOutcome::Stale;
        }
        let filter = match self.pending.take() {
            Some((pending_seq, filter)) if pending_seq == seq => filter,
            _ => self.filter.clone(),
        };

        match result {
            Ok(page) => {
                let rows = page.profiles.len();
                self.install(filter, page, now);
                info!(
                    event = "core.list.fetch_completed",
                    context = %self.context,
                    seq = seq,
                    rows = rows,
                    total = self.view.total_count,
                );
                CompletionOutcome::Applied
            }
            Err(e) => {
                warn!(event = "core.list.fetch_failed", context = %self.context, seq = seq, error = %e);
                let view = Arc::make_mut(&mut self.view);
                view.loading = false;
                view.transitioning = false;
                view.error = Some(e.clone());
                CompletionOutcome::Failed(e)
            }
        }
    }

    /// Patch the displayed rows with an item-level channel event.
    pub fn apply_incremental(&mut self, event: &ChannelEvent) -> PatchOutcome {
        if self.disposed {
            return PatchOutcome::Ignored(IgnoreReason::Disposed);
        }
        let Some(patch) = ItemPatch::from_event(event) else {
            return PatchOutcome::Ignored(IgnoreReason::NotAnItemEvent);
        };
        let Some(installed) = &self.installed else {
            return PatchOutcome::Ignored(IgnoreReason::NothingInstalled);
        };
        if self.session.as_ref().is_some_and(|s| s != patch.session) {
            return PatchOutcome::Ignored(IgnoreReason::OtherSession);
        }
        if !patch.matches(&installed.filter) {
            return PatchOutcome::Ignored(IgnoreReason::FilterMismatch);
        }
        let Some(key) = patch.natural_key() else {
            return PatchOutcome::Ignored(IgnoreReason::MissingKey);
        };

        let searching = installed.filter.has_search();
        let outcome = match self.view.position(key) {
            Some(position) => {
                if !patch.changes(&self.view.items()[position]) {
                    return PatchOutcome::Unchanged;
                }
                if let Some(item) = Arc::make_mut(&mut self.view).item_mut(position) {
                    patch.apply_to(item);
                }
                PatchOutcome::Updated
            }
            None => {
                if !patch.may_insert
                    || searching
                    || installed.filter.category == ProfileCategory::Analyzed
                {
                    return PatchOutcome::Ignored(IgnoreReason::NotFound);
                }
                if self.view.len() >= installed.filter.limit as usize {
                    return PatchOutcome::Ignored(IgnoreReason::PageFull);
                }
                Arc::make_mut(&mut self.view).push(patch.to_record());
                PatchOutcome::Inserted
            }
        };

        if !searching {
            let snapshot = Arc::new(self.view.settled());
            self.cache.update(&installed.key, snapshot);
        }
        debug!(
            event = "core.list.patch_applied",
            context = %self.context,
            key = key,
            outcome = ?outcome,
        );
        outcome
    }

    /// Apply a filter edit. Page changes load immediately; other edits wait
    /// out a debounce window and return `None`.
    pub fn set_filter(&mut self, update: FilterUpdate, now: Instant) -> Option<LoadDecision> {
        if self.disposed {
            return Some(LoadDecision::Disposed);
        }
        let is_page = update.is_page();
        let is_search = update.is_search();
        self.filter.apply(update);

        if is_page {
            self.cancel_debounce();
            return Some(self.resolve(now, false));
        }

        let filter_key = self.timer(TimerClass::FilterDebounce);
        let search_key = self.timer(TimerClass::SearchDebounce);
        if is_search {
            self.timers.cancel(&filter_key);
            self.timers
                .schedule(search_key, now + self.settings.search_debounce);
        } else if !self.timers.is_pending(&search_key) {
            self.timers
                .schedule(filter_key, now + self.settings.filter_debounce);
        }
        self.poll_timers(now)
    }

    /// Fire a debounced load if its window has elapsed.
    pub fn poll_timers(&mut self, now: Instant) -> Option<LoadDecision> {
        if self.disposed {
            return None;
        }
        let fired = self.timers.take_expired(now);
        let debounce_fired = fired.iter().any(|(_, class)| {
            matches!(class, TimerClass::FilterDebounce | TimerClass::SearchDebounce)
        });
        if !debounce_fired {
            return None;
        }
        self.cancel_debounce();
        Some(self.resolve(now, false))
    }

    /// Cancel the outstanding fetch. Its completion will report `Canceled`.
    pub fn cancel_inflight(&mut self) -> bool {
        match self.tracker.cancel_all() {
            Some(seq) => {
                self.pending = None;
                self.clear_flags();
                debug!(event = "core.list.fetch_cancel_requested", context = %self.context, seq = seq);
                true
            }
            None => false,
        }
    }

    /// Cancel everything and stop accepting input.
    pub fn dispose(&mut self) {
        self.tracker.cancel_all();
        self.timers.clear();
        self.pending = None;
        self.disposed = true;
        debug!(event = "core.list.disposed", context = %self.context);
    }
}

impl Drop for ListEngine {
    fn drop(&mut self) {
        self.tracker.cancel_all();
    }
}

impl std::fmt::Debug for ListEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListEngine")
            .field("context", &self.context)
            .field("filter", &self.filter)
            .field("rows", &self.view.len())
            .field("pending", &self.pending.as_ref().map(|(seq, _)| *seq))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use scrapewatch_protocol::{ProfileFailed, ProfileScraped, ProfileStatusUpdate};

    const S1: &str = "s1";

    fn url(name: &str) -> String {
        format!("https://instagram.com/{}", name)
    }

    fn record(name: &str, depth: u32) -> ProfileRecord {
        ProfileRecord {
            id: Some(format!("id-{}", name)),
            profile_url: Some(url(name)),
            username: Some(name.to_string()),
            session_id: Some(SessionId::new(S1)),
            depth: Some(depth),
            status: ItemStatus::Pending,
            profile_data: Some(serde_json::json!({ "followers": 10 })),
            created_at: Some("2024-01-01T00:00:00Z".to_string()),
            ..ProfileRecord::default()
        }
    }

    fn page(names: &[&str], depth: u32, total: u64) -> ProfilePage {
        ProfilePage {
            profiles: names.iter().map(|n| record(n, depth)).collect(),
            total_count: total,
            page: 1,
            limit: 20,
            total_pages: 1,
            has_more: false,
        }
    }

    fn status_event(name: &str, depth: u32, status: ItemStatus) -> ChannelEvent {
        ChannelEvent::ProfileStatusUpdate(ProfileStatusUpdate {
            session_id: SessionId::new(S1),
            profile_url: Some(url(name)),
            username: Some(name.to_string()),
            depth: Some(depth),
            status,
            ..ProfileStatusUpdate::default()
        })
    }

    fn engine() -> ListEngine {
        ListEngine::new(
            Some(SessionId::new(S1)),
            FilterSet::default(),
            ListSettings::default(),
        )
    }

    fn fetch_seq(decision: LoadDecision) -> u64 {
        match decision {
            LoadDecision::Fetch { ticket, .. } => ticket.seq,
            other => panic!("expected fetch, got {:?}", other),
        }
    }

    fn loaded(names: &[&str], depth: u32, clock: &ManualClock) -> ListEngine {
        let mut engine = engine();
        let seq = fetch_seq(engine.load(FilterSet::default(), clock.now()));
        let outcome = engine.complete(
            seq,
            FetchOutcome::Completed(Ok(page(names, depth, names.len() as u64))),
            clock.now(),
        );
        assert_eq!(outcome, CompletionOutcome::Applied);
        engine
    }

    #[test]
    fn test_first_load_shows_loading_then_installs() {
        let clock = ManualClock::new();
        let mut engine = engine();

        let seq = fetch_seq(engine.load(FilterSet::default(), clock.now()));
        assert!(engine.view().loading);
        assert!(!engine.view().transitioning);

        engine.complete(seq, FetchOutcome::Completed(Ok(page(&["a", "b"], 1, 2))), clock.now());
        let view = engine.view();
        assert!(!view.is_busy());
        assert_eq!(view.len(), 2);
        assert_eq!(view.total_count, 2);
    }

    #[test]
    fn test_later_miss_shows_transitioning() {
        let clock = ManualClock::new();
        let mut engine = loaded(&["a"], 1, &clock);

        let mut filter = FilterSet::default();
        filter.apply(FilterUpdate::Depth(Some(2)));
        fetch_seq(engine.load(filter, clock.now()));

        let view = engine.view();
        assert!(view.transitioning);
        assert!(!view.loading);
        assert_eq!(view.len(), 1);
    }

    #[test]
    fn test_older_response_never_overwrites_newer() {
        let clock = ManualClock::new();
        let mut engine = engine();

        let mut filter_a = FilterSet::default();
        filter_a.apply(FilterUpdate::Depth(Some(1)));
        let mut filter_b = FilterSet::default();
        filter_b.apply(FilterUpdate::Depth(Some(2)));

        let a = fetch_seq(engine.load(filter_a, clock.now()));
        let b = fetch_seq(engine.load(filter_b.clone(), clock.now()));

        let applied = engine.complete(b, FetchOutcome::Completed(Ok(page(&["b"], 2, 1))), clock.now());
        assert_eq!(applied, CompletionOutcome::Applied);

        let late = engine.complete(a, FetchOutcome::Completed(Ok(page(&["a"], 1, 1))), clock.now());
        assert_eq!(late, CompletionOutcome::Stale);
        assert!(engine.view().get(&url("b")).is_some());
        assert!(engine.view().get(&url("a")).is_none());
        assert_eq!(engine.installed_filter(), Some(&filter_b));
    }

    #[test]
    fn test_cache_hit_installs_without_flags() {
        let clock = ManualClock::new();
        let mut engine = loaded(&["a"], 1, &clock);

        let mut other = FilterSet::default();
        other.apply(FilterUpdate::Depth(Some(3)));
        let seq = fetch_seq(engine.load(other, clock.now()));
        engine.complete(seq, FetchOutcome::Completed(Ok(page(&["z"], 3, 1))), clock.now());

        clock.advance(Duration::from_secs(60));
        assert!(matches!(engine.load(FilterSet::default(), clock.now()), LoadDecision::CacheHit));
        let view = engine.view();
        assert!(!view.is_busy());
        assert!(view.get(&url("a")).is_some());
    }

    #[test]
    fn test_expired_cache_entry_is_refetched() {
        let clock = ManualClock::new();
        let mut engine = loaded(&["a"], 1, &clock);

        clock.advance(Duration::from_secs(300));
        assert!(matches!(
            engine.load(FilterSet::default(), clock.now()),
            LoadDecision::Fetch { .. }
        ));
    }

    #[test]
    fn test_search_results_are_not_cached() {
        let clock = ManualClock::new();
        let mut engine = engine();
        let mut filter = FilterSet::default();
        filter.apply(FilterUpdate::Search("ali".to_string()));

        let seq = fetch_seq(engine.load(filter.clone(), clock.now()));
        engine.complete(seq, FetchOutcome::Completed(Ok(page(&["alice"], 1, 1))), clock.now());

        assert!(!engine.is_cached(&filter));
        assert!(matches!(engine.load(filter, clock.now()), LoadDecision::Fetch { .. }));
    }

    #[test]
    fn test_refresh_on_first_page_evicts_only_its_category() {
        let clock = ManualClock::new();
        let mut engine = engine();

        let root = FilterSet {
            category: ProfileCategory::Root,
            ..FilterSet::default()
        };
        let mut root_page_1 = root.clone();
        root_page_1.apply(FilterUpdate::Page(1));
        let related = FilterSet {
            category: ProfileCategory::Related,
            ..FilterSet::default()
        };

        for filter in [&root_page_1, &related, &root] {
            let seq = fetch_seq(engine.load(filter.clone(), clock.now()));
            engine.complete(seq, FetchOutcome::Completed(Ok(page(&["a"], 0, 1))), clock.now());
            assert!(engine.is_cached(filter));
        }

        assert!(matches!(engine.refresh(clock.now()), LoadDecision::Fetch { .. }));
        assert!(!engine.is_cached(&root));
        assert!(!engine.is_cached(&root_page_1));
        assert!(engine.is_cached(&related));
    }

    #[test]
    fn test_refresh_past_first_page_keeps_other_pages() {
        let clock = ManualClock::new();
        let mut engine = loaded(&["a"], 1, &clock);

        let seq = fetch_seq(engine.set_filter(FilterUpdate::Page(1), clock.now()).unwrap());
        engine.complete(seq, FetchOutcome::Completed(Ok(page(&["b"], 1, 1))), clock.now());

        engine.refresh(clock.now());
        assert!(engine.is_cached(&FilterSet::default()));
    }

    #[test]
    fn test_clear_cache_empties_everything() {
        let clock = ManualClock::new();
        let mut engine = loaded(&["a"], 1, &clock);
        engine.clear_cache();
        assert!(!engine.is_cached(&FilterSet::default()));
    }

    #[test]
    fn test_failure_keeps_rows_and_sets_error() {
        let clock = ManualClock::new();
        let mut engine = loaded(&["a"], 1, &clock);

        let seq = fetch_seq(engine.refresh(clock.now()));
        let err = SyncError::Fetch {
            message: "502 Bad Gateway".to_string(),
            status: Some(502),
        };
        let outcome = engine.complete(seq, FetchOutcome::Completed(Err(err.clone())), clock.now());

        assert_eq!(outcome, CompletionOutcome::Failed(err.clone()));
        let view = engine.view();
        assert_eq!(view.error, Some(err));
        assert!(!view.is_busy());
        assert_eq!(view.len(), 1);
    }

    #[test]
    fn test_superseded_cancel_keeps_loading() {
        let clock = ManualClock::new();
        let mut engine = engine();

        let first = fetch_seq(engine.load(FilterSet::default(), clock.now()));
        let mut filter = FilterSet::default();
        filter.apply(FilterUpdate::Depth(Some(1)));
        let second = fetch_seq(engine.load(filter, clock.now()));

        assert_eq!(
            engine.complete(first, FetchOutcome::Canceled, clock.now()),
            CompletionOutcome::Canceled
        );
        assert!(engine.view().loading);

        assert!(engine.cancel_inflight());
        assert!(!engine.view().loading);
        assert_eq!(
            engine.complete(second, FetchOutcome::Canceled, clock.now()),
            CompletionOutcome::Canceled
        );
        assert!(engine.view().error.is_none());
    }

    #[test]
    fn test_update_mutates_only_carried_fields() {
        let clock = ManualClock::new();
        let mut engine = loaded(&["a", "b"], 1, &clock);
        let before_a = engine.view().get(&url("a")).cloned().unwrap();
        let before_b = engine.view().get(&url("b")).cloned().unwrap();

        let outcome = engine.apply_incremental(&status_event("a", 1, ItemStatus::Processing));
        assert_eq!(outcome, PatchOutcome::Updated);

        let view = engine.view();
        let after_a = view.get(&url("a")).unwrap();
        assert_eq!(after_a.status, ItemStatus::Processing);
        assert_eq!(
            ProfileRecord {
                status: before_a.status,
                ..after_a.clone()
            },
            before_a
        );
        assert_eq!(view.get(&url("b")), Some(&before_b));
    }

    #[test]
    fn test_scraped_event_sets_data_and_timestamp() {
        let clock = ManualClock::new();
        let mut engine = loaded(&["a"], 1, &clock);

        let event = ChannelEvent::ProfileScraped(ProfileScraped {
            session_id: SessionId::new(S1),
            profile_url: Some(url("a")),
            depth: Some(1),
            profile_data: Some(serde_json::json!({ "followers": 99 })),
            scraped_at: Some("2024-02-02T00:00:00Z".to_string()),
            ..ProfileScraped::default()
        });
        assert_eq!(engine.apply_incremental(&event), PatchOutcome::Updated);

        let view = engine.view();
        let item = view.get(&url("a")).unwrap();
        assert_eq!(item.status, ItemStatus::Succeeded);
        assert_eq!(item.scraped_at.as_deref(), Some("2024-02-02T00:00:00Z"));
        assert_eq!(item.profile_data, Some(serde_json::json!({ "followers": 99 })));
        assert_eq!(item.created_at.as_deref(), Some("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn test_failed_event_keeps_existing_error_when_absent() {
        let clock = ManualClock::new();
        let mut engine = loaded(&["a"], 1, &clock);

        let event = ChannelEvent::ProfileFailed(ProfileFailed {
            session_id: SessionId::new(S1),
            profile_url: Some(url("a")),
            depth: Some(1),
            error: Some("private account".to_string()),
            ..ProfileFailed::default()
        });
        engine.apply_incremental(&event);
        assert_eq!(
            engine.view().get(&url("a")).and_then(|i| i.error.clone()).as_deref(),
            Some("private account")
        );
    }

    #[test]
    fn test_non_matching_events_leave_view_reference_stable() {
        let clock = ManualClock::new();
        let mut engine = engine();
        let mut filter = FilterSet::default();
        filter.apply(FilterUpdate::Depth(Some(1)));
        filter.apply(FilterUpdate::Status(Some(ItemStatus::Pending)));
        let seq = fetch_seq(engine.load(filter, clock.now()));
        engine.complete(seq, FetchOutcome::Completed(Ok(page(&["a"], 1, 1))), clock.now());

        let before = engine.view();

        let wrong_depth = status_event("a", 2, ItemStatus::Pending);
        let wrong_status = status_event("a", 1, ItemStatus::Failed);
        let mut other_session = status_event("a", 1, ItemStatus::Pending);
        if let ChannelEvent::ProfileStatusUpdate(update) = &mut other_session {
            update.session_id = SessionId::new("s2");
        }

        for event in [wrong_depth, wrong_status, other_session] {
            assert!(matches!(engine.apply_incremental(&event), PatchOutcome::Ignored(_)));
            assert!(Arc::ptr_eq(&before, &engine.view()));
        }
    }

    #[test]
    fn test_category_filters_by_depth() {
        let clock = ManualClock::new();
        let mut engine = engine();
        let root = FilterSet {
            category: ProfileCategory::Root,
            ..FilterSet::default()
        };
        let seq = fetch_seq(engine.load(root, clock.now()));
        engine.complete(seq, FetchOutcome::Completed(Ok(page(&["seed"], 0, 1))), clock.now());

        assert_eq!(
            engine.apply_incremental(&status_event("deep", 2, ItemStatus::Pending)),
            PatchOutcome::Ignored(IgnoreReason::FilterMismatch)
        );
        assert_eq!(
            engine.apply_incremental(&status_event("seed", 0, ItemStatus::Processing)),
            PatchOutcome::Updated
        );
    }

    #[test]
    fn test_repeated_event_is_idempotent() {
        let clock = ManualClock::new();
        let mut engine = loaded(&["a"], 1, &clock);
        let event = status_event("a", 1, ItemStatus::Failed);

        engine.apply_incremental(&event);
        let once = engine.view();
        assert_eq!(engine.apply_incremental(&event), PatchOutcome::Unchanged);
        assert!(Arc::ptr_eq(&once, &engine.view()));

        let mut inserted = loaded(&["a"], 1, &clock);
        let new_row = status_event("n", 1, ItemStatus::Processing);
        assert_eq!(inserted.apply_incremental(&new_row), PatchOutcome::Inserted);
        let after_first = (*inserted.view()).clone();
        inserted.apply_incremental(&new_row);
        assert_eq!(*inserted.view(), after_first);
    }

    #[test]
    fn test_insert_until_page_is_full() {
        let clock = ManualClock::new();
        let mut engine = engine();
        let seq = fetch_seq(engine.load(FilterSet::with_limit(2), clock.now()));
        engine.complete(seq, FetchOutcome::Completed(Ok(page(&["a"], 1, 1))), clock.now());

        assert_eq!(
            engine.apply_incremental(&status_event("b", 1, ItemStatus::Pending)),
            PatchOutcome::Inserted
        );
        assert_eq!(engine.view().total_count, 2);
        assert_eq!(
            engine.apply_incremental(&status_event("c", 1, ItemStatus::Pending)),
            PatchOutcome::Ignored(IgnoreReason::PageFull)
        );
        assert_eq!(engine.view().len(), 2);
    }

    #[test]
    fn test_scraped_event_never_inserts() {
        let clock = ManualClock::new();
        let mut engine = loaded(&["a"], 1, &clock);
        let event = ChannelEvent::ProfileScraped(ProfileScraped {
            session_id: SessionId::new(S1),
            profile_url: Some(url("unseen")),
            depth: Some(1),
            ..ProfileScraped::default()
        });
        assert_eq!(
            engine.apply_incremental(&event),
            PatchOutcome::Ignored(IgnoreReason::NotFound)
        );
    }

    #[test]
    fn test_patches_write_through_to_cache() {
        let clock = ManualClock::new();
        let mut engine = loaded(&["a"], 1, &clock);
        engine.apply_incremental(&status_event("a", 1, ItemStatus::Failed));

        let mut other = FilterSet::default();
        other.apply(FilterUpdate::Depth(Some(5)));
        let seq = fetch_seq(engine.load(other, clock.now()));
        engine.complete(seq, FetchOutcome::Completed(Ok(page(&[], 5, 0))), clock.now());

        assert!(matches!(engine.load(FilterSet::default(), clock.now()), LoadDecision::CacheHit));
        assert_eq!(
            engine.view().get(&url("a")).map(|i| i.status),
            Some(ItemStatus::Failed)
        );
    }

    #[test]
    fn test_filter_edits_are_debounced() {
        let clock = ManualClock::new();
        let mut engine = loaded(&["a"], 1, &clock);

        assert!(engine.set_filter(FilterUpdate::Depth(Some(1)), clock.now()).is_none());
        clock.advance(Duration::from_millis(50));
        assert!(engine.set_filter(FilterUpdate::Depth(Some(2)), clock.now()).is_none());
        clock.advance(Duration::from_millis(60));
        assert!(engine.poll_timers(clock.now()).is_none());

        clock.advance(Duration::from_millis(40));
        match engine.poll_timers(clock.now()) {
            Some(LoadDecision::Fetch { filter, .. }) => assert_eq!(filter.depth, Some(2)),
            other => panic!("expected one fetch for the settled filter, got {:?}", other),
        }
        assert!(engine.next_deadline().is_none());
    }

    #[test]
    fn test_search_uses_longer_window() {
        let clock = ManualClock::new();
        let mut engine = loaded(&["a"], 1, &clock);

        engine.set_filter(FilterUpdate::Search("al".to_string()), clock.now());
        clock.advance(Duration::from_millis(150));
        assert!(engine.poll_timers(clock.now()).is_none());

        clock.advance(Duration::from_millis(150));
        match engine.poll_timers(clock.now()) {
            Some(LoadDecision::Fetch { filter, .. }) => {
                assert_eq!(filter.search, "al");
                assert_eq!(filter.page, 0);
            }
            other => panic!("expected search fetch, got {:?}", other),
        }
    }

    #[test]
    fn test_page_change_loads_immediately() {
        let clock = ManualClock::new();
        let mut engine = loaded(&["a"], 1, &clock);
        match engine.set_filter(FilterUpdate::Page(2), clock.now()) {
            Some(LoadDecision::Fetch { filter, .. }) => assert_eq!(filter.page, 2),
            other => panic!("expected immediate fetch, got {:?}", other),
        }
    }

    #[test]
    fn test_dispose_turns_completions_into_cancellations() {
        let clock = ManualClock::new();
        let mut engine = engine();
        let decision = engine.load(FilterSet::default(), clock.now());
        let LoadDecision::Fetch { ticket, .. } = decision else {
            panic!("expected fetch");
        };

        engine.dispose();
        assert!(ticket.token.is_cancelled());
        assert_eq!(
            engine.complete(ticket.seq, FetchOutcome::Completed(Ok(page(&["a"], 1, 1))), clock.now()),
            CompletionOutcome::Canceled
        );
        assert!(engine.view().is_empty());
        assert!(matches!(engine.load(FilterSet::default(), clock.now()), LoadDecision::Disposed));
    }
}
