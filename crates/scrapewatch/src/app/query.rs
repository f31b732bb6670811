use clap::{Arg, ArgAction, Command};

fn json_arg() -> Arg {
    Arg::new("json")
        .long("json")
        .help("Output in JSON format")
        .action(ArgAction::SetTrue)
}

pub fn profiles_command() -> Command {
    Command::new("profiles")
        .about("List scraped profiles, optionally scoped to one session")
        .arg(
            Arg::new("session")
                .long("session")
                .short('s')
                .help("Only show profiles belonging to this session"),
        )
        .arg(
            Arg::new("type")
                .long("type")
                .short('t')
                .help("Profile category")
                .value_parser(["all", "root", "related", "analyzed"]),
        )
        .arg(
            Arg::new("depth")
                .long("depth")
                .short('d')
                .help("Only show profiles at this crawl depth")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("status")
                .long("status")
                .help("Only show profiles with this status")
                .value_parser(["pending", "processing", "scraped", "failed"]),
        )
        .arg(
            Arg::new("search")
                .long("search")
                .help("Free-text search over usernames and URLs"),
        )
        .arg(
            Arg::new("page")
                .long("page")
                .short('p')
                .help("Page number, starting at 1")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new("limit")
                .long("limit")
                .short('l')
                .help("Rows per page (overrides config)")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new("sort-by")
                .long("sort-by")
                .help("Field to sort by (default: createdAt)"),
        )
        .arg(
            Arg::new("asc")
                .long("asc")
                .help("Sort ascending instead of descending")
                .action(ArgAction::SetTrue),
        )
        .arg(json_arg())
}

pub fn system_command() -> Command {
    Command::new("system")
        .about("Show system-wide session counters, health and recent activity")
        .arg(
            Arg::new("watch")
                .long("watch")
                .short('w')
                .help("Keep refreshing from live events until interrupted")
                .action(ArgAction::SetTrue),
        )
        .arg(json_arg().conflicts_with("watch"))
}

pub fn queues_command() -> Command {
    Command::new("queues")
        .about("Show job queue counters")
        .arg(
            Arg::new("clean")
                .long("clean")
                .help("Remove completed and failed jobs from the named queue")
                .value_name("QUEUE"),
        )
        .arg(json_arg())
}

pub fn health_command() -> Command {
    Command::new("health")
        .about("Check whether the dashboard backend is reachable")
        .arg(json_arg())
}

pub fn analysis_command() -> Command {
    Command::new("analysis")
        .about("Show post-scrape analysis progress for a session")
        .arg(
            Arg::new("session")
                .help("Session id")
                .required(true)
                .index(1),
        )
        .arg(json_arg())
}
