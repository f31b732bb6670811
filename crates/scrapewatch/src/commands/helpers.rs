use std::io;

use clap::ArgMatches;
use tracing::{error, warn};

use scrapewatch_config::ScrapewatchConfig;
use scrapewatch_core::channel::WebSocketTransport;
use scrapewatch_core::{
    ChannelClient, DashboardApi, Notification, NotificationKind, ReconnectPolicy, SessionId,
    SyncError,
};

use crate::color;

/// Load configuration with warning on errors, then apply `--api-url` and
/// `--ws-url`.
///
/// Falls back to defaults if config loading fails, but notifies the user via:
/// - stderr message for immediate visibility
/// - structured log event `cli.config.load_failed` for debugging
pub fn load_config_with_warning(matches: &ArgMatches) -> ScrapewatchConfig {
    let mut config = match ScrapewatchConfig::load_hierarchy() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "{} Could not load config: {}. Using defaults.\n\
                 Tip: Check ~/.scrapewatch/config.toml and ./.scrapewatch/config.toml for syntax errors.",
                color::warning("Warning:"),
                e
            );
            warn!(
                event = "cli.config.load_failed",
                error = %e,
                "Config load failed, using defaults"
            );
            ScrapewatchConfig::default()
        }
    };
    apply_url_overrides(&mut config, matches);
    config
}

/// Global URL flags win over every config source.
pub fn apply_url_overrides(config: &mut ScrapewatchConfig, matches: &ArgMatches) {
    if let Some(url) = matches.get_one::<String>("api-url") {
        config.api.base_url = Some(url.clone());
    }
    if let Some(url) = matches.get_one::<String>("ws-url") {
        config.channel.url = Some(url.clone());
    }
}

pub fn api_client(config: &ScrapewatchConfig) -> Result<DashboardApi, Box<dyn std::error::Error>> {
    DashboardApi::from_config(config).map_err(|e| {
        eprintln!("{} {}", color::error("Invalid API URL:"), e);
        error!(event = "cli.api.init_failed", error = %e);
        e.into()
    })
}

/// Channel client for the configured URL. Not yet connected.
pub fn channel_client(config: &ScrapewatchConfig) -> ChannelClient {
    ChannelClient::new(
        WebSocketTransport::new(config.channel.url()),
        ReconnectPolicy::from_config(&config.channel),
    )
}

pub fn runtime() -> io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
}

pub fn session_id(matches: &ArgMatches) -> Result<SessionId, Box<dyn std::error::Error>> {
    let id = matches
        .get_one::<String>("session")
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .ok_or("Session id is required")?;
    Ok(SessionId::new(id))
}

/// Print a request failure and hand it back as the command error.
pub fn report_failure(context: &str, e: SyncError) -> Box<dyn std::error::Error> {
    eprintln!("{} {}", color::error(&format!("{}:", context)), e);
    error!(event = "cli.request_failed", context = context, error = %e);
    e.into()
}

/// Print a JSON error object to stdout and return it as the command error.
pub fn print_json_error(message: &str, code: &str) -> Box<dyn std::error::Error> {
    let body = serde_json::json!({ "error": message, "code": code });
    println!("{}", body);
    message.to_string().into()
}

/// One notification as a single terminal line.
pub fn format_notification(notification: &Notification) -> String {
    let label = color::notification(notification.kind, &notification.title);
    match &notification.message {
        Some(message) => format!("{} {}", label, message),
        None => label,
    }
}

/// Print notifications the moment they are dispatched. Errors go to stderr.
pub fn print_notification(notification: &Notification) {
    let line = format_notification(notification);
    match notification.kind {
        NotificationKind::Error => eprintln!("{}", line),
        _ => println!("{}", line),
    }
}

pub fn format_count(count: u64, noun: &str) -> String {
    if count == 1 {
        format!("1 {}", noun)
    } else {
        format!("{} {}s", count, noun)
    }
}

/// `"42%"` style rendering of a 0..=100 percentage.
pub fn format_percent(value: f64) -> String {
    format!("{}%", value.clamp(0.0, 100.0).round() as u32)
}

/// Fixed-width text progress bar for a 0..=100 percentage.
pub fn progress_bar(percent: u32, width: usize) -> String {
    let filled = (percent.min(100) as usize * width) / 100;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}
