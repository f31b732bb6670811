use clap::{Arg, ArgAction, Command};

fn session_arg() -> Arg {
    Arg::new("session")
        .help("Session id")
        .required(true)
        .index(1)
}

fn json_arg() -> Arg {
    Arg::new("json")
        .long("json")
        .help("Output in JSON format")
        .action(ArgAction::SetTrue)
}

pub fn sessions_command() -> Command {
    Command::new("sessions")
        .about("List scraping sessions")
        .arg(
            Arg::new("dashboard")
                .long("dashboard")
                .help("Use the dashboard listing, which carries live progress counters")
                .action(ArgAction::SetTrue),
        )
        .arg(json_arg())
}

pub fn create_command() -> Command {
    Command::new("create")
        .about("Create a scraping session from one or more root profiles")
        .arg(
            Arg::new("name")
                .long("name")
                .short('n')
                .help("Session name")
                .required(true),
        )
        .arg(
            Arg::new("root")
                .long("root")
                .short('r')
                .help("Root profile URL or username (repeatable)")
                .action(ArgAction::Append)
                .required(true),
        )
        .arg(
            Arg::new("depth")
                .long("depth")
                .short('d')
                .help("Maximum crawl depth (default: 1)")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("per-depth")
                .long("per-depth")
                .help("Maximum profiles scraped per depth (default: unlimited)")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("description")
                .long("description")
                .help("Free-form description shown in the dashboard"),
        )
        .arg(
            Arg::new("no-analysis")
                .long("no-analysis")
                .help("Disable post-scrape analysis for this session")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-start")
                .long("no-start")
                .help("Create the session without starting the first batch")
                .action(ArgAction::SetTrue),
        )
        .arg(json_arg())
}

pub fn pause_command() -> Command {
    Command::new("pause")
        .about("Pause a running session")
        .arg(session_arg())
}

pub fn resume_command() -> Command {
    Command::new("resume")
        .about("Resume a paused session")
        .arg(session_arg())
}

pub fn stop_command() -> Command {
    Command::new("stop")
        .about("Stop a session")
        .arg(session_arg())
}

pub fn delete_command() -> Command {
    Command::new("delete")
        .about("Delete a session (running sessions must be stopped first)")
        .arg(session_arg())
}

pub fn watch_command() -> Command {
    Command::new("watch")
        .about("Follow a session's progress live until interrupted")
        .arg(session_arg())
        .arg(
            Arg::new("quiet-events")
                .long("quiet-events")
                .help("Do not print notifications for channel events")
                .action(ArgAction::SetTrue),
        )
}
