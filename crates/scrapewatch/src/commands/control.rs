use clap::ArgMatches;
use tracing::{error, info};

use scrapewatch_core::{DashboardApi, NotificationDispatcher, SessionControl, SessionId, SyncError};

use super::helpers::{
    api_client, load_config_with_warning, print_notification, report_failure, runtime, session_id,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    Pause,
    Resume,
    Stop,
    Delete,
}

impl Action {
    fn as_str(&self) -> &'static str {
        match self {
            Action::Pause => "pause",
            Action::Resume => "resume",
            Action::Stop => "stop",
            Action::Delete => "delete",
        }
    }
}

/// Look the session up, then run `action` against it.
///
/// The outcome is printed through the notification dispatcher, so the
/// messages match what a dashboard would show.
pub(crate) fn handle_control_command(
    matches: &ArgMatches,
    action: Action,
) -> Result<(), Box<dyn std::error::Error>> {
    let id = session_id(matches)?;

    info!(
        event = "cli.control_started",
        action = action.as_str(),
        session = %id
    );

    let config = load_config_with_warning(matches);
    let api = api_client(&config)?;
    let dispatcher = NotificationDispatcher::from_config(&config);
    let _printer = dispatcher.subscribe(print_notification);
    let control = SessionControl::new(api.clone()).with_notifications(dispatcher);

    let result = runtime()?.block_on(run_action(&api, &control, &id, action));

    match result {
        Ok(()) => {
            info!(
                event = "cli.control_completed",
                action = action.as_str(),
                session = %id
            );
            Ok(())
        }
        // Already announced by the dispatcher.
        Err(e @ SyncError::ControlAction { .. }) => {
            error!(
                event = "cli.control_failed",
                action = action.as_str(),
                session = %id,
                error = %e
            );
            Err(e.into())
        }
        Err(e) => Err(report_failure(
            &format!("Could not load session '{}'", id),
            e,
        )),
    }
}

async fn run_action(
    api: &DashboardApi,
    control: &SessionControl,
    id: &SessionId,
    action: Action,
) -> Result<(), SyncError> {
    let session = api.get_session(id).await?;
    match action {
        Action::Pause => control.pause(&session).await?,
        Action::Resume => control.resume(&session).await?,
        Action::Stop => control.stop(&session).await?,
        Action::Delete => control.delete_session(&session).await?,
    };
    Ok(())
}
