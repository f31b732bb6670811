use clap::ArgMatches;
use tracing::{error, info};

use scrapewatch_core::{ScrapewatchError, SyncError};
use scrapewatch_protocol::AnalysisStats;

use super::helpers::{
    api_client, format_percent, load_config_with_warning, print_json_error, progress_bar,
    runtime, session_id,
};
use crate::color;

pub(crate) fn handle_analysis_command(
    matches: &ArgMatches,
) -> Result<(), Box<dyn std::error::Error>> {
    let id = session_id(matches)?;
    let json_output = matches.get_flag("json");

    info!(event = "cli.analysis_started", session = %id);

    let config = load_config_with_warning(matches);
    let api = api_client(&config)?;
    let stats = match runtime()?.block_on(api.analysis_stats(&id)) {
        Ok(stats) => stats,
        Err(e) => {
            let e = SyncError::from(e);
            if json_output {
                return Err(print_json_error(&e.to_string(), e.error_code()));
            }
            eprintln!("{} {}", color::error("Could not load analysis stats:"), e);
            error!(event = "cli.analysis_failed", session = %id, error = %e);
            return Err(e.into());
        }
    };

    if json_output {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        for line in render_analysis(&stats) {
            println!("{}", line);
        }
    }

    info!(event = "cli.analysis_completed", session = %id);
    Ok(())
}

fn render_analysis(stats: &AnalysisStats) -> Vec<String> {
    let percent = stats.percent_complete.clamp(0.0, 100.0);
    let mut lines = vec![
        format!(
            "{} {} {}",
            color::bold("Analysis"),
            progress_bar(percent.round() as u32, 30),
            format_percent(percent)
        ),
        format!("  Analyzed:  {}", stats.total_analyzed),
        format!("  Pending:   {}", stats.total_pending_analysis),
        format!("  Stored:    {}", stats.total_stored),
        format!("  Skipped:   {}", stats.total_skipped),
    ];
    if let Some(pending) = stats.pending_profiles {
        lines.push(format!("  Queued:    {}", pending));
    }
    lines
}
