//! Filtered, paginated profile lists.
//!
//! [`ListEngine`] is the synchronous state machine that reconciles REST
//! pages with channel events. [`ListSync`] runs one on a tokio task, feeds it
//! channel events and fetch results, and publishes the view.

mod engine;
mod filter;
mod sync;
mod view;

pub use engine::{
    CompletionOutcome, IgnoreReason, ListEngine, ListSettings, LoadDecision, PatchOutcome,
};
pub use filter::{DEFAULT_LIMIT, DEFAULT_SORT_BY, FilterSet, FilterUpdate};
pub use sync::{ListSync, ProfileSource};
pub use view::ViewState;
