use clap::ArgMatches;
use tracing::{error, info};

use scrapewatch_core::{NotificationDispatcher, SessionControl};
use scrapewatch_protocol::{CreateSessionConfig, CreateSessionRequest};

use super::helpers::{api_client, load_config_with_warning, print_notification, runtime};
use crate::color;

const DEFAULT_MAX_DEPTH: u32 = 1;

pub(crate) fn handle_create_command(
    matches: &ArgMatches,
) -> Result<(), Box<dyn std::error::Error>> {
    let request = request_from_args(matches)?;
    let start = !matches.get_flag("no-start");
    let json_output = matches.get_flag("json");

    info!(
        event = "cli.create_started",
        name = %request.name,
        roots = request.root_profiles.len(),
        max_depth = request.config.max_depth,
        start = start
    );

    let config = load_config_with_warning(matches);
    let api = api_client(&config)?;
    let dispatcher = NotificationDispatcher::from_config(&config);
    // JSON mode keeps stdout machine-readable; failures still reach stderr below.
    let _printer = (!json_output).then(|| dispatcher.subscribe(print_notification));
    let control = SessionControl::new(api).with_notifications(dispatcher);

    let created = match runtime()?.block_on(control.create(&request, start)) {
        Ok(created) => created,
        Err(e) => {
            if json_output {
                eprintln!("{} {}", color::error("Could not create session:"), e);
            }
            error!(event = "cli.create_failed", name = %request.name, error = %e);
            return Err(e.into());
        }
    };

    if json_output {
        println!("{}", serde_json::to_string_pretty(&created.response)?);
    } else {
        match &created.id {
            Some(id) => println!("{} {}", color::good("Created session"), color::accent(id)),
            None => println!("{}", color::good("Created session")),
        }
        if created.existing_profiles > 0 {
            println!(
                "  {}",
                color::muted(&format!(
                    "{} root profile(s) were already stored and will be reused",
                    created.existing_profiles
                ))
            );
        }
        if start && created.id.is_some() && created.start_error.is_none() {
            println!("  {}", color::muted("First batch queued."));
        } else if let Some(id) = &created.id {
            println!(
                "  {} scrapewatch resume {}",
                color::muted("Start:"),
                color::accent(id)
            );
        }
    }

    if let Some(e) = created.start_error {
        if json_output {
            eprintln!("{} {}", color::error("Session created but not started:"), e);
        }
        error!(event = "cli.create_start_failed", session = ?created.id, error = %e);
        return Err(e.into());
    }

    info!(event = "cli.create_completed", session = ?created.id);
    Ok(())
}

fn request_from_args(
    matches: &ArgMatches,
) -> Result<CreateSessionRequest, Box<dyn std::error::Error>> {
    let name = matches
        .get_one::<String>("name")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or("Session name is required")?;
    let root_profiles: Vec<String> = matches
        .get_many::<String>("root")
        .into_iter()
        .flatten()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if root_profiles.is_empty() {
        return Err("At least one root profile is required".into());
    }

    Ok(CreateSessionRequest {
        name,
        description: matches
            .get_one::<String>("description")
            .cloned()
            .unwrap_or_default(),
        root_profiles,
        config: CreateSessionConfig {
            max_depth: matches
                .get_one::<u32>("depth")
                .copied()
                .unwrap_or(DEFAULT_MAX_DEPTH),
            max_profiles_per_depth: matches.get_one::<u32>("per-depth").copied(),
            analysis_enabled: !matches.get_flag("no-analysis"),
        },
    })
}
