//! Log query state engine for rsyslox
//!
//! This crate owns the filter, time window, pagination, selection and
//! auto-refresh state of a log exploration session and turns it into
//! requests against a [`LogApi`](rsyslox_client::LogApi).

mod engine;
mod export;
mod pagination;
mod params;
mod reconcile;
mod refresh;
mod selection;
mod time_window;

pub use engine::{
    EngineEvent, EngineOptions, FetchOutcome, FilterOptions, LogQueryEngine, PendingFetch,
    QueryChange, Transition,
};
pub use export::{ExportArtifact, ExportError, export_csv, export_json};
pub use pagination::{DEFAULT_PAGE_SIZE, Pagination, SHOW_ALL_LIMIT};
pub use params::build_params;
pub use reconcile::{FetchTrigger, Highlight, fresh_ids};
pub use refresh::{DEFAULT_REFRESH_INTERVAL_SECS, RefreshScheduler, RefreshState};
pub use selection::Selection;
pub use time_window::{ResolvedWindow, format_instant, normalize_bound, resolve};

// Re-export types used in our public API
pub use rsyslox_types::{
    FilterState, LogEntry, LogId, QueryParams, RelativeDuration, TimeMode, TimeWindow,
};
