use clap::ArgMatches;
use tracing::{error, info};

use scrapewatch_core::list::FilterSet;
use scrapewatch_core::{
    ItemStatus, ProfileCategory, ProfilePage, ProfileRecord, ScrapewatchError, SessionId,
    SortOrder, SyncError,
};

use super::helpers::{api_client, load_config_with_warning, print_json_error, runtime};
use crate::color;
use crate::table::{Cell, Style, TableFormatter, truncate};

const ERROR_WIDTH: usize = 40;

pub(crate) fn handle_profiles_command(
    matches: &ArgMatches,
) -> Result<(), Box<dyn std::error::Error>> {
    let json_output = matches.get_flag("json");
    let session = matches.get_one::<String>("session").map(SessionId::new);

    let config = load_config_with_warning(matches);
    let filter = filter_from_args(matches, config.list.page_size())?;

    info!(
        event = "cli.profiles_started",
        session = ?session,
        cache_key = %filter.cache_key(),
        json_output = json_output
    );

    let api = api_client(&config)?;
    let result = runtime()?.block_on(api.list_profiles(session.as_ref(), &filter));
    let page = match result {
        Ok(page) => page,
        Err(e) => {
            let e = SyncError::from(e);
            if json_output {
                return Err(print_json_error(&e.to_string(), e.error_code()));
            }
            eprintln!("{} {}", color::error("Could not list profiles:"), e);
            error!(event = "cli.profiles_failed", error = %e);
            return Err(e.into());
        }
    };

    if json_output {
        println!("{}", serde_json::to_string_pretty(&page_json(&page))?);
    } else if page.profiles.is_empty() {
        println!("No profiles match these filters.");
    } else {
        print_profiles_table(&page.profiles);
        println!(
            "{}",
            color::muted(&format!(
                "Page {} of {} ({} total){}",
                page.page,
                page.total_pages.max(1),
                page.total_count,
                if page.has_more { ", more with --page" } else { "" }
            ))
        );
    }

    info!(
        event = "cli.profiles_completed",
        count = page.profiles.len(),
        total = page.total_count
    );
    Ok(())
}

/// Build the 0-based filter from 1-based CLI arguments.
fn filter_from_args(
    matches: &ArgMatches,
    default_limit: u32,
) -> Result<FilterSet, Box<dyn std::error::Error>> {
    let limit = matches
        .get_one::<u32>("limit")
        .copied()
        .unwrap_or(default_limit);
    let mut filter = FilterSet::with_limit(limit);

    if let Some(category) = matches.get_one::<String>("type") {
        filter.category = category.parse::<ProfileCategory>()?;
    }
    filter.depth = matches.get_one::<u32>("depth").copied();
    if let Some(status) = matches.get_one::<String>("status") {
        filter.status = Some(status.parse::<ItemStatus>()?);
    }
    if let Some(search) = matches.get_one::<String>("search") {
        filter.search = search.clone();
    }
    filter.page = matches
        .get_one::<u32>("page")
        .map_or(0, |page| page.saturating_sub(1));
    if let Some(sort_by) = matches.get_one::<String>("sort-by") {
        filter.sort_by = sort_by.clone();
    }
    if matches.get_flag("asc") {
        filter.sort_order = SortOrder::Asc;
    }
    Ok(filter)
}

fn page_json(page: &ProfilePage) -> serde_json::Value {
    serde_json::json!({
        "profiles": page.profiles,
        "pagination": {
            "totalCount": page.total_count,
            "page": page.page,
            "limit": page.limit,
            "totalPages": page.total_pages,
            "hasMore": page.has_more,
        },
    })
}

fn print_profiles_table(profiles: &[ProfileRecord]) {
    let mut table = TableFormatter::new(&["Profile", "Depth", "Status", "Scraped", "Error"]);
    for profile in profiles {
        table.push_row(vec![
            Cell::styled(profile.natural_key().unwrap_or("-"), Style::Accent),
            Cell::plain(profile.depth.map_or_else(|| "-".to_string(), |d| d.to_string())),
            Cell::styled(
                profile.status.as_wire_str(),
                Style::Item(profile.status),
            ),
            Cell::styled(profile.scraped_at.as_deref().unwrap_or("-"), Style::Muted),
            Cell::plain(truncate(profile.error.as_deref().unwrap_or(""), ERROR_WIDTH)),
        ]);
    }
    table.print();
}
