use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::ArgMatches;
use tokio::sync::mpsc;
use tracing::{error, info};

use scrapewatch_config::ScrapewatchConfig;
use scrapewatch_core::monitor::{MonitorSettings, depth_progress};
use scrapewatch_core::notify::install_bridge;
use scrapewatch_core::{
    DashboardApi, MonitorSync, MonitoringSnapshot, Notification, NotificationDispatcher,
    SessionId, SessionMonitor, TokioClock,
};

use super::helpers::{
    api_client, channel_client, format_notification, format_percent, load_config_with_warning,
    progress_bar, runtime, session_id,
};
use crate::color;
use crate::table::{Cell, Style, TableFormatter, truncate};

const CLEAR_SCREEN: &str = "\x1B[2J\x1B[1;1H";
const NOTIFICATION_LINES: usize = 5;
const RECENT_LINES: usize = 8;

pub(crate) fn handle_watch_command(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let id = session_id(matches)?;
    let quiet_events = matches.get_flag("quiet-events");

    info!(event = "cli.watch_started", session = %id, quiet_events = quiet_events);

    let config = load_config_with_warning(matches);
    let api = api_client(&config)?;
    runtime()?
        .block_on(run_watch(config, api, id.clone(), quiet_events))
        .inspect_err(|e| {
            error!(event = "cli.watch_failed", session = %id, error = %e);
        })
}

async fn run_watch(
    config: ScrapewatchConfig,
    api: DashboardApi,
    id: SessionId,
    quiet_events: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let channel = channel_client(&config);
    channel.init();

    let dispatcher = NotificationDispatcher::from_config(&config);
    let (note_tx, mut note_rx) = mpsc::unbounded_channel::<Notification>();
    let _listener = dispatcher.subscribe(move |notification: &Notification| {
        let _ = note_tx.send(notification.clone());
    });
    let _bridge = if quiet_events {
        Vec::new()
    } else {
        install_bridge(&channel, &dispatcher)
    };

    let monitor = SessionMonitor::new(id.clone(), MonitorSettings::from_config(&config));
    let sync = MonitorSync::spawn(monitor, Arc::new(api), &channel, Arc::new(TokioClock));
    let mut snapshot = sync.watch();
    let mut notifications: VecDeque<Notification> = VecDeque::with_capacity(NOTIFICATION_LINES);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let current = snapshot.borrow_and_update().clone();
        print!("{}", CLEAR_SCREEN);
        for line in render_snapshot(&id, &current, channel.is_connected()) {
            println!("{}", line);
        }
        let visible = visible_notifications(&notifications, Utc::now());
        if !visible.is_empty() {
            println!();
            for notification in visible {
                println!("{}", format_notification(notification));
            }
        }
        println!("\n{}", color::muted("Live. Press Ctrl+C to exit."));
        io::stdout().flush()?;

        tokio::select! {
            _ = &mut ctrl_c => break,
            changed = snapshot.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            Some(notification) = note_rx.recv() => {
                notifications.push_front(notification);
                notifications.truncate(NOTIFICATION_LINES);
            }
        }
    }

    sync.shutdown().await;
    channel.teardown();
    info!(event = "cli.watch_completed", session = %id);
    Ok(())
}

/// Notifications still inside their display window, newest first.
fn visible_notifications(
    notifications: &VecDeque<Notification>,
    now: DateTime<Utc>,
) -> Vec<&Notification> {
    notifications
        .iter()
        .filter(|n| {
            chrono::Duration::from_std(n.duration)
                .map_or(true, |window| now.signed_duration_since(n.created_at) < window)
        })
        .collect()
}

fn render_snapshot(id: &SessionId, snapshot: &MonitoringSnapshot, connected: bool) -> Vec<String> {
    let mut lines = Vec::new();
    let channel = if connected {
        color::good("live")
    } else {
        color::caution("reconnecting")
    };

    match &snapshot.session {
        Some(session) => lines.push(format!(
            "{} {} {}  {}",
            color::bold(&session.name),
            color::muted(&format!("({})", id)),
            color::session_status(session.status, &session.status.to_string()),
            channel
        )),
        None => lines.push(format!("{} {}  {}", color::bold("Session"), color::accent(id), channel)),
    }
    if let Some(e) = &snapshot.error {
        lines.push(format!("{} {}", color::bad("Error:"), e));
    }
    if snapshot.session.is_none() && snapshot.loading {
        lines.push(color::muted("Loading..."));
        return lines;
    }

    lines.push(format!(
        "Overall {} {}",
        progress_bar(snapshot.overall_progress, 30),
        format_percent(f64::from(snapshot.overall_progress))
    ));

    let metrics = &snapshot.processing_metrics;
    lines.push(format!(
        "Rate: {:.1}/min  Avg: {:.1}s  ETA: {}  Success: {}  Credits: {}",
        metrics.processing_rate,
        metrics.average_time_per_profile,
        metrics.estimated_time_remaining,
        format_percent(metrics.success_rate),
        metrics.api_credits_used
    ));

    if let Some(batch) = &snapshot.current_batch {
        lines.push(format!(
            "Batch: depth {}, {}/{} processed",
            batch.depth, batch.processed_count, batch.total_count
        ));
    }

    if !snapshot.depth_stats.is_empty() {
        lines.push(String::new());
        lines.extend(depth_table(snapshot).render());
    }

    if !snapshot.recent_profiles.is_empty() {
        lines.push(String::new());
        lines.push(color::bold("Recent profiles"));
        for update in snapshot.recent_profiles.iter().take(RECENT_LINES) {
            let mut line = format!(
                "  {} {}",
                color::item_status(update.status, &format!("{:<10}", update.status.as_wire_str())),
                update.natural_key().unwrap_or("-")
            );
            if let Some(error) = &update.error {
                line.push_str(&format!(" {}", color::muted(&truncate(error, 60))));
            }
            lines.push(line);
        }
    }
    lines
}

fn depth_table(snapshot: &MonitoringSnapshot) -> TableFormatter {
    let mut table = TableFormatter::new(&[
        "Depth", "Total", "Scraped", "Failed", "Pending", "In Queue", "Reused", "Progress",
    ]);
    for stats in &snapshot.depth_stats {
        table.push_row(vec![
            Cell::styled(stats.depth.to_string(), Style::Accent),
            Cell::plain(stats.total.to_string()),
            Cell::plain(stats.scraped.to_string()),
            Cell::plain(stats.failed.to_string()),
            Cell::plain(stats.pending.to_string()),
            Cell::plain(stats.in_queue.to_string()),
            Cell::plain(stats.from_database.to_string()),
            Cell::plain(format_percent(depth_progress(stats))),
        ]);
    }
    table
}
