use std::collections::BTreeMap;

use clap::ArgMatches;
use tracing::{error, info};

use scrapewatch_core::{ScrapewatchError, SyncError};
use scrapewatch_protocol::QueueStatus;

use super::helpers::{api_client, load_config_with_warning, print_json_error, runtime};
use crate::color;
use crate::table::{Cell, Style, TableFormatter};

pub(crate) fn handle_queues_command(
    matches: &ArgMatches,
) -> Result<(), Box<dyn std::error::Error>> {
    let json_output = matches.get_flag("json");
    let config = load_config_with_warning(matches);
    let api = api_client(&config)?;
    let rt = runtime()?;

    if let Some(queue) = matches.get_one::<String>("clean") {
        info!(event = "cli.queue_clean_started", queue = %queue);
        return match rt.block_on(api.clean_queue(queue)) {
            Ok(response) => {
                if json_output {
                    println!("{}", serde_json::to_string_pretty(&response)?);
                } else {
                    println!("{} {}", color::good("Cleaned queue"), color::accent(queue));
                }
                info!(event = "cli.queue_clean_completed", queue = %queue);
                Ok(())
            }
            Err(e) => {
                let e = SyncError::from(e);
                eprintln!("{} '{}': {}", color::error("Could not clean queue"), queue, e);
                error!(event = "cli.queue_clean_failed", queue = %queue, error = %e);
                Err(e.into())
            }
        };
    }

    info!(event = "cli.queues_started");
    let queues = match rt.block_on(api.queue_status()) {
        Ok(queues) => queues,
        Err(e) => {
            let e = SyncError::from(e);
            if json_output {
                return Err(print_json_error(&e.to_string(), e.error_code()));
            }
            eprintln!("{} {}", color::error("Could not load queue status:"), e);
            error!(event = "cli.queues_failed", error = %e);
            return Err(e.into());
        }
    };

    if json_output {
        println!("{}", serde_json::to_string_pretty(&queues)?);
    } else if queues.is_empty() {
        println!("No queues reported.");
    } else {
        queue_table(&queues).print();
    }

    info!(event = "cli.queues_completed", count = queues.len());
    Ok(())
}

pub(crate) fn queue_table(queues: &BTreeMap<String, QueueStatus>) -> TableFormatter {
    let mut table = TableFormatter::new(&[
        "Queue",
        "Waiting",
        "Active",
        "Completed",
        "Failed",
        "Delayed",
        "Paused",
    ]);
    for (name, queue) in queues {
        table.push_row(vec![
            Cell::styled(name.as_str(), Style::Accent),
            Cell::plain(queue.waiting.to_string()),
            Cell::plain(queue.active.to_string()),
            Cell::plain(queue.completed.to_string()),
            Cell::plain(queue.failed.to_string()),
            Cell::plain(queue.delayed.to_string()),
            Cell::plain(queue.paused.to_string()),
        ]);
    }
    table
}
