//! Built-in fallback values used by the config accessors.

pub const API_BASE_URL: &str = "http://localhost:5000/api";
pub const CHANNEL_URL: &str = "ws://localhost:5000/ws";

pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;
pub const RECONNECT_MIN_DELAY_MS: u64 = 1_000;
pub const RECONNECT_MAX_DELAY_MS: u64 = 5_000;

pub const CACHE_TTL_SECS: u64 = 5 * 60;

pub const PAGE_SIZE: u32 = 20;
pub const FILTER_DEBOUNCE_MS: u64 = 100;
pub const SEARCH_DEBOUNCE_MS: u64 = 300;

pub const PROGRESS_DEBOUNCE_MS: u64 = 500;
pub const STATUS_BATCH_MS: u64 = 1_000;
pub const RECENT_LIMIT: usize = 10;

pub const SYSTEM_REFRESH_INTERVAL_SECS: u64 = 30;
pub const ACTIVITY_LIMIT: usize = 50;

pub const NOTIFICATION_DURATION_MS: u64 = 5_000;
