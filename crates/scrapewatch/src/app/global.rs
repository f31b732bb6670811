use clap::{Arg, ArgAction, Command};

pub fn root_command() -> Command {
    Command::new("scrapewatch")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Watch and control Instagram scraping sessions from the terminal")
        .long_about("scrapewatch talks to the scraping dashboard backend over REST and its live event channel. It lists sessions and profiles, follows a session's progress as it runs, and pauses, resumes, stops, creates or deletes sessions.")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("no-color")
                .long("no-color")
                .help("Disable colored output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("api-url")
                .long("api-url")
                .help("Dashboard API base URL (overrides config and SCRAPEWATCH_API_URL)")
                .value_name("URL")
                .global(true),
        )
        .arg(
            Arg::new("ws-url")
                .long("ws-url")
                .help("Event channel URL (overrides config and SCRAPEWATCH_WS_URL)")
                .value_name("URL")
                .global(true),
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
}
