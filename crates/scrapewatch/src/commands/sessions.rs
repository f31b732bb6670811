use clap::ArgMatches;
use tracing::{error, info};

use scrapewatch_core::{ScrapewatchError, SessionRecord, SyncError};

use super::helpers::{
    api_client, format_count, format_percent, load_config_with_warning, print_json_error, runtime,
};
use crate::color;
use crate::table::{Cell, Style, TableFormatter, truncate};

const NAME_WIDTH: usize = 32;

pub(crate) fn handle_sessions_command(
    matches: &ArgMatches,
) -> Result<(), Box<dyn std::error::Error>> {
    let json_output = matches.get_flag("json");
    let dashboard = matches.get_flag("dashboard");

    info!(
        event = "cli.sessions_started",
        json_output = json_output,
        dashboard = dashboard
    );

    let config = load_config_with_warning(matches);
    let api = api_client(&config)?;
    let result = runtime()?.block_on(async {
        if dashboard {
            api.dashboard_sessions().await
        } else {
            api.list_sessions().await
        }
    });

    let sessions = match result {
        Ok(sessions) => sessions,
        Err(e) => {
            let e = SyncError::from(e);
            if json_output {
                return Err(print_json_error(&e.to_string(), e.error_code()));
            }
            eprintln!("{} {}", color::error("Could not list sessions:"), e);
            error!(event = "cli.sessions_failed", error = %e);
            return Err(e.into());
        }
    };

    if json_output {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
    } else if sessions.is_empty() {
        println!("No sessions found.");
    } else {
        print_sessions_table(&sessions);
        println!(
            "{}",
            color::muted(&format_count(sessions.len() as u64, "session"))
        );
    }

    info!(event = "cli.sessions_completed", count = sessions.len());
    Ok(())
}

fn print_sessions_table(sessions: &[SessionRecord]) {
    let mut table =
        TableFormatter::new(&["Id", "Name", "Status", "Depth", "Profiles", "Progress", "Created"]);
    for session in sessions {
        table.push_row(vec![
            Cell::styled(session.id.as_str(), Style::Accent),
            Cell::plain(truncate(&session.name, NAME_WIDTH)),
            Cell::styled(session.status.to_string(), Style::Session(session.status)),
            Cell::plain(depth_cell(session)),
            Cell::plain(profiles_cell(session)),
            Cell::plain(progress_cell(session)),
            Cell::styled(created_cell(session), Style::Muted),
        ]);
    }
    table.print();
}

/// `current/max`, or just the max when the backend has not reported a current depth.
fn depth_cell(session: &SessionRecord) -> String {
    match session.current_depth {
        Some(current) => format!("{}/{}", current, session.max_depth()),
        None => format!("-/{}", session.max_depth()),
    }
}

fn profiles_cell(session: &SessionRecord) -> String {
    match (session.scraped_profiles, session.total_profiles) {
        (Some(scraped), Some(total)) => format!("{}/{}", scraped, total),
        (None, Some(total)) => format!("0/{}", total),
        (Some(scraped), None) => scraped.to_string(),
        (None, None) => "-".to_string(),
    }
}

fn progress_cell(session: &SessionRecord) -> String {
    session
        .progress_percentage
        .or(session.progress)
        .map_or_else(|| "-".to_string(), format_percent)
}

/// Date part of the creation timestamp.
fn created_cell(session: &SessionRecord) -> String {
    session
        .created_at
        .as_deref()
        .and_then(|ts| chrono::DateTime::parse_from_rfc3339(ts).ok())
        .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
        .or_else(|| session.created_at.clone())
        .unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrapewatch_core::SessionId;

    fn session() -> SessionRecord {
        SessionRecord {
            id: SessionId::new("s1"),
            name: "crawl".to_string(),
            ..SessionRecord::default()
        }
    }

    #[test]
    fn test_depth_cell() {
        let mut s = session();
        s.config.max_depth = Some(3);
        assert_eq!(depth_cell(&s), "-/3");
        s.current_depth = Some(1);
        assert_eq!(depth_cell(&s), "1/3");
    }

    #[test]
    fn test_profiles_cell() {
        let mut s = session();
        assert_eq!(profiles_cell(&s), "-");
        s.total_profiles = Some(40);
        assert_eq!(profiles_cell(&s), "0/40");
        s.scraped_profiles = Some(12);
        assert_eq!(profiles_cell(&s), "12/40");
    }

    #[test]
    fn test_progress_prefers_percentage() {
        let mut s = session();
        assert_eq!(progress_cell(&s), "-");
        s.progress = Some(10.0);
        assert_eq!(progress_cell(&s), "10%");
        s.progress_percentage = Some(55.6);
        assert_eq!(progress_cell(&s), "56%");
    }

    #[test]
    fn test_created_cell_formats_rfc3339() {
        let mut s = session();
        assert_eq!(created_cell(&s), "-");
        s.created_at = Some("2024-03-01T09:15:00.000Z".to_string());
        assert_eq!(created_cell(&s), "2024-03-01 09:15");
        s.created_at = Some("yesterday".to_string());
        assert_eq!(created_cell(&s), "yesterday");
    }
}
