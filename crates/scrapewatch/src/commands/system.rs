use std::io::{self, Write};
use std::sync::Arc;

use clap::ArgMatches;
use tracing::{error, info};

use scrapewatch_config::ScrapewatchConfig;
use scrapewatch_core::system::{SystemSettings, SystemView};
use scrapewatch_core::{
    DashboardApi, ScrapewatchError, SyncError, SystemMonitor, SystemSync, TokioClock,
};
use scrapewatch_protocol::{SystemHealth, SystemSnapshot};

use super::helpers::{
    api_client, channel_client, load_config_with_warning, print_json_error, runtime,
};
use super::queues::queue_table;
use crate::color;

const CLEAR_SCREEN: &str = "\x1B[2J\x1B[1;1H";

pub(crate) fn handle_system_command(
    matches: &ArgMatches,
) -> Result<(), Box<dyn std::error::Error>> {
    let json_output = matches.get_flag("json");
    let watch_mode = matches.get_flag("watch");

    info!(
        event = "cli.system_started",
        json_output = json_output,
        watch_mode = watch_mode
    );

    let config = load_config_with_warning(matches);
    let api = api_client(&config)?;

    if watch_mode {
        return runtime()?.block_on(run_system_watch(config, api));
    }

    let snapshot = match runtime()?.block_on(api.system_snapshot()) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            let e = SyncError::from(e);
            if json_output {
                return Err(print_json_error(&e.to_string(), e.error_code()));
            }
            eprintln!("{} {}", color::error("Could not load system stats:"), e);
            error!(event = "cli.system_failed", error = %e);
            return Err(e.into());
        }
    };

    if json_output {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        for line in render_snapshot(&snapshot) {
            println!("{}", line);
        }
    }

    info!(event = "cli.system_completed");
    Ok(())
}

async fn run_system_watch(
    config: ScrapewatchConfig,
    api: DashboardApi,
) -> Result<(), Box<dyn std::error::Error>> {
    let channel = channel_client(&config);
    channel.init();

    let sync = SystemSync::spawn(
        SystemMonitor::new(SystemSettings::from_config(&config)),
        Arc::new(api),
        &channel,
        Arc::new(TokioClock),
    );
    let mut view = sync.watch();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let current = view.borrow_and_update().clone();
        print!("{}", CLEAR_SCREEN);
        for line in render_view(&current, channel.is_connected()) {
            println!("{}", line);
        }
        println!("\n{}", color::muted("Live. Press Ctrl+C to exit."));
        io::stdout().flush()?;

        tokio::select! {
            _ = &mut ctrl_c => break,
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    sync.shutdown().await;
    channel.teardown();
    info!(event = "cli.system_watch_completed");
    Ok(())
}

fn render_view(view: &SystemView, connected: bool) -> Vec<String> {
    let mut lines = Vec::new();
    let channel = if connected {
        color::good("live")
    } else {
        color::caution("reconnecting")
    };
    let updated = view
        .last_update
        .map_or_else(|| "never".to_string(), |at| at.format("%H:%M:%S").to_string());
    lines.push(format!(
        "{} {}  {}",
        color::bold("System"),
        channel,
        color::muted(&format!("updated {}", updated))
    ));
    if let Some(e) = &view.error {
        lines.push(format!("{} {}", color::bad("Error:"), e));
    }
    match &view.snapshot {
        Some(snapshot) => lines.extend(render_snapshot(snapshot)),
        None if view.loading => lines.push(color::muted("Loading...")),
        None => lines.push(color::muted("No data yet.")),
    }
    lines
}

fn render_snapshot(snapshot: &SystemSnapshot) -> Vec<String> {
    let mut lines = vec![
        format!(
            "Sessions: {} total, {} active, {} completed, {} failed",
            snapshot.total_sessions,
            snapshot.active_sessions,
            snapshot.completed_sessions,
            snapshot.failed_sessions
        ),
        format!(
            "Profiles scraped: {}  Rate: {:.1}/min",
            snapshot.total_profiles_scraped, snapshot.processing_rate
        ),
    ];
    if let Some(health) = &snapshot.system_health {
        lines.push(format!("Health: {}", health_line(health)));
    }
    if !snapshot.queue_stats.is_empty() {
        lines.push(String::new());
        lines.extend(queue_table(&snapshot.queue_stats).render());
    }
    if !snapshot.recent_activity.is_empty() {
        lines.push(String::new());
        lines.push(color::bold("Recent activity"));
        for entry in &snapshot.recent_activity {
            lines.push(format!(
                "  {} {} {}",
                color::muted(&entry.timestamp),
                color::accent(&entry.kind),
                entry.message
            ));
        }
    }
    lines
}

fn health_line(health: &SystemHealth) -> String {
    [("mongodb", health.mongodb), ("redis", health.redis), ("api", health.api)]
        .iter()
        .map(|(name, up)| {
            if *up {
                color::good(&format!("{} up", name))
            } else {
                color::bad(&format!("{} down", name))
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
