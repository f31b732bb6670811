use clap::ArgMatches;
use tracing::{info, warn};

use scrapewatch_core::api::DashboardApi;
use scrapewatch_protocol::HealthStatus;

use super::helpers::{api_client, load_config_with_warning, runtime};
use crate::color;

/// Exits non-zero when the backend is unreachable so scripts can gate on it.
pub(crate) fn handle_health_command(
    matches: &ArgMatches,
) -> Result<(), Box<dyn std::error::Error>> {
    let json_output = matches.get_flag("json");

    let config = load_config_with_warning(matches);
    let api = api_client(&config)?;
    info!(event = "cli.health_started", api = api.base_url());

    let status = runtime()?.block_on(api.health());

    if json_output {
        println!("{}", serde_json::to_string_pretty(&health_json(&api, &status))?);
    } else {
        match &status {
            HealthStatus::Online { status } => println!(
                "{} {} {}",
                color::good("Online"),
                color::accent(api.base_url()),
                color::muted(&format!("({})", status))
            ),
            HealthStatus::Offline => println!(
                "{} {}",
                color::bad("Offline"),
                color::accent(api.base_url())
            ),
        }
    }

    if status.is_online() {
        info!(event = "cli.health_completed", online = true);
        Ok(())
    } else {
        warn!(event = "cli.health_completed", online = false);
        Err("Backend is offline".into())
    }
}

fn health_json(api: &DashboardApi, status: &HealthStatus) -> serde_json::Value {
    match status {
        HealthStatus::Online { status } => serde_json::json!({
            "api": api.base_url(),
            "online": true,
            "status": status,
        }),
        HealthStatus::Offline => serde_json::json!({
            "api": api.base_url(),
            "online": false,
        }),
    }
}
