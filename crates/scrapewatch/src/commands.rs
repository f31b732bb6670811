use clap::ArgMatches;
use tracing::{error, info};

mod analysis;
mod control;
mod create;
mod health;
mod helpers;
mod profiles;
mod queues;
mod sessions;
mod system;
mod watch;

pub fn run_command(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        event = "cli.app.startup_completed",
        version = env!("CARGO_PKG_VERSION")
    );

    match matches.subcommand() {
        Some(("sessions", sub_matches)) => sessions::handle_sessions_command(sub_matches),
        Some(("profiles", sub_matches)) => profiles::handle_profiles_command(sub_matches),
        Some(("watch", sub_matches)) => watch::handle_watch_command(sub_matches),
        Some(("create", sub_matches)) => create::handle_create_command(sub_matches),
        Some(("pause", sub_matches)) => {
            control::handle_control_command(sub_matches, control::Action::Pause)
        }
        Some(("resume", sub_matches)) => {
            control::handle_control_command(sub_matches, control::Action::Resume)
        }
        Some(("stop", sub_matches)) => {
            control::handle_control_command(sub_matches, control::Action::Stop)
        }
        Some(("delete", sub_matches)) => {
            control::handle_control_command(sub_matches, control::Action::Delete)
        }
        Some(("system", sub_matches)) => system::handle_system_command(sub_matches),
        Some(("queues", sub_matches)) => queues::handle_queues_command(sub_matches),
        Some(("analysis", sub_matches)) => analysis::handle_analysis_command(sub_matches),
        Some(("health", sub_matches)) => health::handle_health_command(sub_matches),
        _ => {
            error!(event = "cli.command_unknown");
            Err("Unknown command".into())
        }
    }
}
