mod global;
mod query;
mod session;


use clap::Command;

pub fn build_cli() -> Command {
    global::root_command()
        .subcommand(session::sessions_command())
        .subcommand(query::profiles_command())
        .subcommand(session::watch_command())
        .subcommand(session::create_command())
        .subcommand(session::pause_command())
        .subcommand(session::resume_command())
        .subcommand(session::stop_command())
        .subcommand(session::delete_command())
        .subcommand(query::system_command())
        .subcommand(query::queues_command())
        .subcommand(query::analysis_command())
        .subcommand(query::health_command())
}
