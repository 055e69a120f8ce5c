use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

use rsyslox_client::{ApiError, LogApi};
use rsyslox_types::{
    FilterState, LogEntry, LogId, LogsPage, MetaValue, QueryParams, RelativeDuration, TimeMode,
    TimeWindow,
};

use crate::pagination::{DEFAULT_PAGE_SIZE, Pagination};
use crate::params::build_params;
use crate::reconcile::{FetchTrigger, Highlight, fresh_ids};
use crate::refresh::{DEFAULT_REFRESH_INTERVAL_SECS, RefreshScheduler, RefreshState};
use crate::selection::Selection;
use crate::time_window::resolve;

/// How long newly arrived rows stay highlighted
const HIGHLIGHT_DURATION: Duration = Duration::from_millis(1500);

/// Engine tuning
#[derive(Clone, Debug)]
pub struct EngineOptions {
    pub page_size: u32,
    pub refresh_interval_secs: u32,
    pub highlight_duration: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            highlight_duration: HIGHLIGHT_DURATION,
        }
    }
}

/// Events delivered to the engine owner for [`LogQueryEngine::handle_event`]
#[derive(Debug)]
pub enum EngineEvent {
    /// The auto-refresh poll timer fired
    RefreshDue { generation: u64 },
    /// One second of countdown elapsed
    CountdownTick { generation: u64 },
    /// A spawned fetch finished
    FetchCompleted(FetchOutcome),
}

/// A fetch that has been issued but not applied
#[derive(Clone, Debug)]
pub struct PendingFetch {
    pub seq: u64,
    pub trigger: FetchTrigger,
    pub params: QueryParams,
}

/// Result of a fetch, tagged with its sequence number
#[derive(Debug)]
pub struct FetchOutcome {
    pub seq: u64,
    pub trigger: FetchTrigger,
    pub result: Result<LogsPage, ApiError>,
}

/// A mutation of the query (filters or time window)
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryChange {
    Severities(BTreeSet<u8>),
    Facilities(BTreeSet<u8>),
    Hosts(BTreeSet<String>),
    Tags(BTreeSet<String>),
    Message(String),
    /// Replace every filter at once
    Filters(FilterState),
    TimeMode(TimeMode),
    Relative(RelativeDuration),
    AbsoluteStart(String),
    AbsoluteEnd(String),
    /// Replace the whole time window
    TimeWindow(TimeWindow),
}

/// What a state transition requires next
#[must_use]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    /// The displayed rows are out of date and a user fetch is due
    Refetch,
}

impl Transition {
    pub fn needs_fetch(self) -> bool {
        self == Self::Refetch
    }

    fn from_changed(changed: bool) -> Self {
        if changed { Self::Refetch } else { Self::Unchanged }
    }
}

/// Distinct values offered by the filter pickers
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterOptions {
    pub hosts: Vec<String>,
    pub tags: Vec<String>,
    pub severities: Vec<MetaValue>,
    pub facilities: Vec<MetaValue>,
}

/// Owns the state of one log exploration session.
///
/// Every mutation goes through a method here. Methods that change what
/// should be displayed return a [`Transition`]; the owner either awaits
/// [`LogQueryEngine::commit`] or calls [`LogQueryEngine::spawn_fetch`].
pub struct LogQueryEngine<A: LogApi> {
    api: Arc<A>,
    events: mpsc::UnboundedSender<EngineEvent>,
    highlight_duration: Duration,

    // Results
    rows: Vec<LogEntry>,
    total: u64,
    error: Option<String>,
    first_load: bool,
    session_expired: bool,

    // Fetch sequencing
    next_seq: u64,
    applied_seq: u64,
    in_flight: usize,

    // Query
    filters: FilterState,
    time_window: TimeWindow,
    pagination: Pagination,

    selection: Selection,
    highlight: Highlight,
    refresh: RefreshScheduler,
    filter_options: FilterOptions,
    detail: Option<LogEntry>,
}

impl<A: LogApi> LogQueryEngine<A> {
    /// Create an engine. Timer and fetch events are delivered on `events`
    /// and must be passed back through [`LogQueryEngine::handle_event`].
    pub fn new(
        api: A,
        options: EngineOptions,
        events: mpsc::UnboundedSender<EngineEvent>,
    ) -> Self {
        Self {
            api: Arc::new(api),
            refresh: RefreshScheduler::new(options.refresh_interval_secs, events.clone()),
            events,
            highlight_duration: options.highlight_duration,
            rows: Vec::new(),
            total: 0,
            error: None,
            first_load: true,
            session_expired: false,
            next_seq: 0,
            applied_seq: 0,
            in_flight: 0,
            filters: FilterState::default(),
            time_window: TimeWindow::default(),
            pagination: Pagination::new(options.page_size),
            selection: Selection::default(),
            highlight: Highlight::default(),
            filter_options: FilterOptions::default(),
            detail: None,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    // ------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------

    /// Currently loaded rows
    pub fn rows(&self) -> &[LogEntry] {
        &self.rows
    }

    /// Total matching rows on the server
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Message from the last failed fetch
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    /// True until the first successful fetch
    pub fn first_load(&self) -> bool {
        self.first_load
    }

    pub fn loading(&self) -> bool {
        self.in_flight > 0
    }

    /// The server rejected our credentials; fetching has stopped
    pub fn session_expired(&self) -> bool {
        self.session_expired
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn time_window(&self) -> &TimeWindow {
        &self.time_window
    }

    pub fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    pub fn page(&self) -> u32 {
        self.pagination.page()
    }

    pub fn page_size(&self) -> u32 {
        self.pagination.page_size()
    }

    pub fn show_all(&self) -> bool {
        self.pagination.show_all()
    }

    pub fn offset(&self) -> u64 {
        self.pagination.offset()
    }

    pub fn total_pages(&self) -> u32 {
        self.pagination.total_pages(self.total)
    }

    pub fn filter_options(&self) -> &FilterOptions {
        &self.filter_options
    }

    pub fn refresh_state(&self) -> RefreshState {
        self.refresh.state()
    }

    // ------------------------------------------------------------------
    // Query transitions
    // ------------------------------------------------------------------

    /// Apply a filter or time window change. Any real change resets to
    /// page 1 and requires a refetch.
    pub fn apply(&mut self, change: QueryChange) -> Transition {
        let mut filters = self.filters.clone();
        let mut window = self.time_window.clone();

        match change {
            QueryChange::Severities(v) => filters.severities = v,
            QueryChange::Facilities(v) => filters.facilities = v,
            QueryChange::Hosts(v) => filters.hosts = v,
            QueryChange::Tags(v) => filters.tags = v,
            QueryChange::Message(v) => filters.message = v,
            QueryChange::Filters(v) => filters = v,
            QueryChange::TimeMode(v) => window.mode = v,
            QueryChange::Relative(v) => window.relative = v,
            QueryChange::AbsoluteStart(v) => window.start = v,
            QueryChange::AbsoluteEnd(v) => window.end = v,
            QueryChange::TimeWindow(v) => window = v,
        }

        if filters == self.filters && window == self.time_window {
            return Transition::Unchanged;
        }

        self.filters = filters;
        self.time_window = window;
        self.pagination.reset_page();
        Transition::Refetch
    }

    /// Restore default filters and time window and return to page 1
    pub fn reset_filters(&mut self) -> Transition {
        let query_changed =
            self.filters != FilterState::default() || self.time_window != TimeWindow::default();
        self.filters = FilterState::default();
        self.time_window = TimeWindow::default();
        let page_changed = self.pagination.reset_page();
        Transition::from_changed(query_changed || page_changed)
    }

    /// Go to page `n`, clamped to the available pages. Clears any
    /// highlight.
    pub fn set_page(&mut self, n: u32) -> Transition {
        self.highlight.clear();
        Transition::from_changed(self.pagination.set_page(n, self.total))
    }

    /// Change the page size; always returns to page 1
    pub fn set_page_size(&mut self, n: u32) -> Transition {
        Transition::from_changed(self.pagination.set_page_size(n))
    }

    pub fn set_show_all(&mut self, show_all: bool) -> Transition {
        Transition::from_changed(self.pagination.set_show_all(show_all))
    }

    /// Back to page 1 without touching the highlight
    pub fn reset_page(&mut self) -> Transition {
        Transition::from_changed(self.pagination.reset_page())
    }

    /// Apply a change and fetch if needed
    pub async fn update(&mut self, change: QueryChange) {
        let transition = self.apply(change);
        self.commit(transition).await;
    }

    /// Fetch if the transition requires it
    pub async fn commit(&mut self, transition: Transition) {
        if transition.needs_fetch() {
            self.fetch(FetchTrigger::User).await;
        }
    }

    // ------------------------------------------------------------------
    // Fetching
    // ------------------------------------------------------------------

    /// Parameters for the current state, resolving relative windows
    /// against the wall clock
    pub fn query_params(&self) -> QueryParams {
        let window = resolve(&self.time_window, Utc::now());
        build_params(&self.filters, &window, &self.pagination)
    }

    /// Register a new fetch and return what to send
    pub fn begin_fetch(&mut self, trigger: FetchTrigger) -> PendingFetch {
        self.next_seq += 1;
        self.in_flight += 1;
        self.error = None;
        PendingFetch {
            seq: self.next_seq,
            trigger,
            params: self.query_params(),
        }
    }

    /// Apply a finished fetch. Responses older than the one on display
    /// are dropped.
    pub fn finish_fetch(&mut self, outcome: FetchOutcome) {
        self.in_flight = self.in_flight.saturating_sub(1);

        if outcome.seq < self.applied_seq {
            debug!(
                seq = outcome.seq,
                applied = self.applied_seq,
                "discarding stale fetch result"
            );
            return;
        }
        self.applied_seq = outcome.seq;

        match outcome.result {
            Ok(page) => {
                let fresh = fresh_ids(&self.rows, &page.rows, outcome.trigger);
                if !fresh.is_empty() {
                    debug!(count = fresh.len(), "new rows since last poll");
                    self.highlight.flash(fresh, self.highlight_duration);
                }
                debug!(
                    seq = outcome.seq,
                    rows = page.rows.len(),
                    total = page.total,
                    "fetch applied"
                );
                self.rows = page.rows;
                self.total = page.total;
                self.first_load = false;
                self.error = None;
            }
            Err(e) => {
                warn!(seq = outcome.seq, trigger = ?outcome.trigger, "fetch failed: {}", e);
                if e.is_unauthenticated() {
                    self.expire_session();
                }
                self.error = Some(e.to_string());
            }
        }
    }

    fn expire_session(&mut self) {
        self.session_expired = true;
        self.refresh.stop();
    }

    /// An expired session fails fetches locally instead of calling out
    fn reject_expired(&mut self) -> bool {
        if self.session_expired {
            self.error = Some(ApiError::Unauthenticated.to_string());
        }
        self.session_expired
    }

    /// Fetch the current page and wait for it
    pub async fn fetch(&mut self, trigger: FetchTrigger) {
        if self.reject_expired() {
            return;
        }
        let pending = self.begin_fetch(trigger);
        let result = self.api.query_logs(&pending.params).await;
        self.finish_fetch(FetchOutcome {
            seq: pending.seq,
            trigger: pending.trigger,
            result,
        });
    }

    /// Fetch on a background task; the result arrives as
    /// [`EngineEvent::FetchCompleted`]
    pub fn spawn_fetch(&mut self, trigger: FetchTrigger) {
        if self.reject_expired() {
            return;
        }
        let pending = self.begin_fetch(trigger);
        let api = Arc::clone(&self.api);
        let events = self.events.clone();

        tokio::spawn(async move {
            let result = api.query_logs(&pending.params).await;
            let _ = events.send(EngineEvent::FetchCompleted(FetchOutcome {
                seq: pending.seq,
                trigger: pending.trigger,
                result,
            }));
        });
    }

    /// Apply an event from the engine channel
    pub fn handle_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::RefreshDue { generation } => {
                if self.refresh.on_refresh(generation) {
                    debug!("auto-refresh poll");
                    self.spawn_fetch(FetchTrigger::AutoRefresh);
                }
            }
            EngineEvent::CountdownTick { generation } => {
                self.refresh.on_tick(generation);
            }
            EngineEvent::FetchCompleted(outcome) => self.finish_fetch(outcome),
        }
    }

    /// Load the filter picker values. Failures keep the previous options.
    pub async fn fetch_filter_options(&mut self) {
        let (hosts, tags, severities, facilities) = futures::join!(
            self.api.column_values("FromHost"),
            self.api.column_values("SysLogTag"),
            self.api.column_values("Severity"),
            self.api.column_values("Facility"),
        );

        match (hosts, tags, severities, facilities) {
            (Ok(hosts), Ok(tags), Ok(severities), Ok(facilities)) => {
                self.filter_options = FilterOptions {
                    hosts: hosts.into_strings(),
                    tags: tags.into_strings(),
                    severities: severities.into_labeled(),
                    facilities: facilities.into_labeled(),
                };
            }
            (hosts, tags, severities, facilities) => {
                let failure = [hosts.err(), tags.err(), severities.err(), facilities.err()]
                    .into_iter()
                    .flatten()
                    .next();
                if let Some(e) = failure {
                    warn!("failed to load filter options: {}", e);
                    if e.is_unauthenticated() {
                        self.expire_session();
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Auto-refresh
    // ------------------------------------------------------------------

    /// Start polling every `interval_secs`, replacing any running schedule
    pub fn start_auto_refresh(&mut self, interval_secs: u32) {
        if self.session_expired {
            return;
        }
        self.refresh.start(interval_secs);
    }

    pub fn stop_auto_refresh(&mut self) {
        self.refresh.stop();
    }

    pub fn toggle_auto_refresh(&mut self) {
        if self.session_expired && !self.refresh.is_running() {
            return;
        }
        self.refresh.toggle();
    }

    /// Stop all timers. The engine can still be queried afterwards.
    pub fn shutdown(&mut self) {
        self.refresh.stop();
    }

    // ------------------------------------------------------------------
    // Highlight
    // ------------------------------------------------------------------

    /// Rows that arrived in the last auto-refresh poll, while the
    /// highlight window lasts
    pub fn fresh_ids(&self) -> HashSet<LogId> {
        self.highlight.ids()
    }

    pub fn is_fresh(&self, id: LogId) -> bool {
        self.highlight.contains(id)
    }

    pub fn highlight_deadline(&self) -> Option<Instant> {
        self.highlight.deadline()
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    pub fn toggle_selection(&mut self, id: LogId) -> bool {
        self.selection.toggle(id)
    }

    /// Select all loaded rows, or deselect if all are selected
    pub fn toggle_select_all(&mut self) {
        self.selection.toggle_all(&self.rows);
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Forget selected ids that are no longer loaded
    pub fn prune_selection(&mut self) {
        self.selection.retain_loaded(&self.rows);
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn selected_count(&self) -> usize {
        self.selection.len()
    }

    /// Loaded rows that are selected
    pub fn selected_rows(&self) -> Vec<&LogEntry> {
        self.selection.selected_rows(&self.rows)
    }

    // ------------------------------------------------------------------
    // Detail
    // ------------------------------------------------------------------

    pub fn open_detail(&mut self, entry: LogEntry) {
        self.detail = Some(entry);
    }

    pub fn close_detail(&mut self) {
        self.detail = None;
    }

    pub fn detail(&self) -> Option<&LogEntry> {
        self.detail.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use rsyslox_types::MetaValues;

    use crate::params::{HOST, LIMIT, OFFSET, SEVERITY};

    /// Scripted API: pops one queued response per query
    #[derive(Default)]
    struct FakeApi {
        responses: Mutex<VecDeque<Result<LogsPage, ApiError>>>,
        requests: Mutex<Vec<QueryParams>>,
        meta_fails: bool,
    }

    impl FakeApi {
        fn with_pages(pages: Vec<Result<LogsPage, ApiError>>) -> Self {
            Self {
                responses: Mutex::new(pages.into()),
                ..Self::default()
            }
        }

        fn request_count(&self) -> usize {
            self.requests.lock().len()
        }

        fn last_request(&self) -> QueryParams {
            self.requests.lock().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl LogApi for FakeApi {
        async fn query_logs(&self, params: &QueryParams) -> Result<LogsPage, ApiError> {
            self.requests.lock().push(params.clone());
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(LogsPage::default()))
        }

        async fn column_values(&self, column: &str) -> Result<MetaValues, ApiError> {
            if self.meta_fails {
                return Err(ApiError::Http {
                    status: 500,
                    message: "boom".to_string(),
                });
            }
            let json = match column {
                "Severity" => r#"[{"val": 3, "label": "Error"}]"#,
                "Facility" => r#"[{"val": 4, "label": "auth"}]"#,
                _ => r#"["a", "b"]"#,
            };
            Ok(serde_json::from_str(json).unwrap())
        }
    }

    fn page(ids: &[i64], total: u64) -> Result<LogsPage, ApiError> {
        Ok(LogsPage {
            rows: ids.iter().map(|id| LogEntry::new(*id)).collect(),
            total,
            ..LogsPage::default()
        })
    }

    fn engine(
        pages: Vec<Result<LogsPage, ApiError>>,
    ) -> (LogQueryEngine<FakeApi>, mpsc::UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = LogQueryEngine::new(FakeApi::with_pages(pages), EngineOptions::default(), tx);
        (engine, rx)
    }

    /// Feed channel events to the engine until a fetch result is applied
    async fn run_until_fetched(
        engine: &mut LogQueryEngine<FakeApi>,
        rx: &mut mpsc::UnboundedReceiver<EngineEvent>,
    ) {
        while let Some(event) = rx.recv().await {
            let done = matches!(event, EngineEvent::FetchCompleted(_));
            engine.handle_event(event);
            if done {
                return;
            }
        }
    }

    #[tokio::test]
    async fn test_fetch_replaces_rows() {
        let (mut engine, _rx) = engine(vec![page(&[3, 2, 1], 31)]);
        assert!(engine.first_load());

        engine.fetch(FetchTrigger::User).await;
        assert_eq!(engine.rows().len(), 3);
        assert_eq!(engine.total(), 31);
        assert_eq!(engine.total_pages(), 3);
        assert!(!engine.first_load());
        assert!(!engine.loading());
        assert_eq!(engine.error(), None);
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_rows() {
        let (mut engine, _rx) = engine(vec![
            page(&[1, 2], 2),
            Err(ApiError::Http {
                status: 500,
                message: "database unavailable".to_string(),
            }),
        ]);
        engine.fetch(FetchTrigger::User).await;
        engine.fetch(FetchTrigger::AutoRefresh).await;

        assert_eq!(engine.rows().len(), 2);
        assert_eq!(engine.total(), 2);
        assert_eq!(engine.error(), Some("database unavailable"));
        assert!(!engine.session_expired());
    }

    #[tokio::test]
    async fn test_filter_change_resets_page_and_fetches() {
        let (mut engine, _rx) = engine(vec![page(&[1], 100)]);
        engine.fetch(FetchTrigger::User).await;
        assert_eq!(engine.set_page(4), Transition::Refetch);
        assert_eq!(engine.page(), 4);

        engine
            .update(QueryChange::Severities([3, 4].into()))
            .await;
        assert_eq!(engine.page(), 1);
        assert_eq!(engine.api().request_count(), 2);

        let params = engine.api().last_request();
        assert_eq!(params.get_all(SEVERITY), vec!["3", "4"]);
        assert_eq!(params.get(OFFSET), Some("0"));
    }

    #[tokio::test]
    async fn test_unchanged_query_does_not_fetch() {
        let (mut engine, _rx) = engine(vec![]);
        assert_eq!(
            engine.apply(QueryChange::Message(String::new())),
            Transition::Unchanged
        );
        assert_eq!(
            engine.apply(QueryChange::Relative(RelativeDuration::Last1h)),
            Transition::Unchanged
        );
        engine.update(QueryChange::Hosts(BTreeSet::new())).await;
        assert_eq!(engine.api().request_count(), 0);
    }

    #[test]
    fn test_time_mode_switch_keeps_inactive_values() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut engine = LogQueryEngine::new(FakeApi::default(), EngineOptions::default(), tx);

        let _ = engine.apply(QueryChange::Relative(RelativeDuration::Last24h));
        let _ = engine.apply(QueryChange::AbsoluteStart("2025-02-15T10:00".to_string()));
        assert_eq!(
            engine.apply(QueryChange::TimeMode(TimeMode::Absolute)),
            Transition::Refetch
        );
        let _ = engine.apply(QueryChange::TimeMode(TimeMode::Relative));

        assert_eq!(engine.time_window().relative, RelativeDuration::Last24h);
        assert_eq!(engine.time_window().start, "2025-02-15T10:00");
    }

    #[tokio::test]
    async fn test_reset_filters() {
        let (mut engine, _rx) = engine(vec![]);
        let _ = engine.apply(QueryChange::Hosts(["web1".to_string()].into()));
        let _ = engine.apply(QueryChange::TimeWindow(TimeWindow::absolute(
            "2025-02-15T10:00",
            "2025-02-15T11:00",
        )));

        assert_eq!(engine.reset_filters(), Transition::Refetch);
        assert_eq!(engine.filters(), &FilterState::default());
        assert_eq!(engine.time_window(), &TimeWindow::default());
        assert_eq!(engine.page(), 1);
        assert_eq!(engine.reset_filters(), Transition::Unchanged);

        let params = engine.query_params();
        assert!(!params.contains(HOST));
        assert_eq!(params.get(LIMIT), Some("15"));
    }

    #[tokio::test]
    async fn test_page_size_change_refetches_from_first_page() {
        let (mut engine, _rx) = engine(vec![page(&[1], 100)]);
        engine.fetch(FetchTrigger::User).await;
        let _ = engine.set_page(3);
        assert_eq!(engine.set_page_size(50), Transition::Refetch);
        assert_eq!(engine.page(), 1);
        assert_eq!(engine.query_params().get(LIMIT), Some("50"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_refresh_highlights_new_rows() {
        let (mut engine, _rx) = engine(vec![page(&[2, 1], 2), page(&[3, 2], 3)]);
        engine.fetch(FetchTrigger::User).await;
        assert!(engine.fresh_ids().is_empty());

        engine.fetch(FetchTrigger::AutoRefresh).await;
        assert_eq!(engine.fresh_ids(), HashSet::from([LogId(3)]));
        assert!(engine.is_fresh(LogId(3)));

        tokio::time::advance(Duration::from_millis(1600)).await;
        assert!(engine.fresh_ids().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_navigation_clears_highlight() {
        let (mut engine, _rx) = engine(vec![page(&[2, 1], 40), page(&[3, 2], 41)]);
        engine.fetch(FetchTrigger::User).await;
        engine.fetch(FetchTrigger::AutoRefresh).await;
        assert!(!engine.fresh_ids().is_empty());

        let _ = engine.set_page(2);
        assert!(engine.fresh_ids().is_empty());
    }

    #[tokio::test]
    async fn test_user_fetch_does_not_highlight() {
        let (mut engine, _rx) = engine(vec![page(&[2, 1], 2), page(&[3, 2], 3)]);
        engine.fetch(FetchTrigger::User).await;
        engine.fetch(FetchTrigger::User).await;
        assert!(engine.fresh_ids().is_empty());
    }

    #[tokio::test]
    async fn test_stale_response_is_discarded() {
        let (mut engine, _rx) = engine(vec![]);
        let slow = engine.begin_fetch(FetchTrigger::AutoRefresh);
        let fast = engine.begin_fetch(FetchTrigger::User);
        assert!(engine.loading());

        engine.finish_fetch(FetchOutcome {
            seq: fast.seq,
            trigger: fast.trigger,
            result: page(&[10], 1),
        });
        engine.finish_fetch(FetchOutcome {
            seq: slow.seq,
            trigger: slow.trigger,
            result: page(&[1, 2, 3], 3),
        });

        assert!(!engine.loading());
        assert_eq!(engine.rows().len(), 1);
        assert_eq!(engine.rows()[0].id(), LogId(10));
    }

    #[tokio::test]
    async fn test_unauthenticated_stops_fetching() {
        let (mut engine, _rx) = engine(vec![page(&[1], 1), Err(ApiError::Unauthenticated)]);
        engine.fetch(FetchTrigger::User).await;
        engine.start_auto_refresh(30);
        engine.fetch(FetchTrigger::AutoRefresh).await;

        assert!(engine.session_expired());
        assert!(!engine.refresh_state().enabled);
        assert_eq!(engine.rows().len(), 1);

        engine.fetch(FetchTrigger::User).await;
        assert_eq!(engine.api().request_count(), 2);
        assert_eq!(engine.error(), Some("session expired"));

        engine.start_auto_refresh(30);
        assert!(!engine.refresh_state().enabled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_event_spawns_fetch() {
        let (mut engine, mut rx) = engine(vec![page(&[1], 1), page(&[2, 1], 2)]);
        engine.fetch(FetchTrigger::User).await;
        engine.start_auto_refresh(5);

        let mut applied = false;
        while let Some(event) = rx.recv().await {
            let done = matches!(event, EngineEvent::FetchCompleted(_));
            engine.handle_event(event);
            if done {
                applied = true;
                break;
            }
        }

        assert!(applied);
        assert_eq!(engine.rows().len(), 2);
        assert!(engine.is_fresh(LogId(2)));
        assert!(engine.refresh_state().countdown_secs >= 4);
        engine.shutdown();
        assert!(!engine.refresh_state().enabled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_poll_keeps_schedule_running() {
        let (mut engine, mut rx) = engine(vec![
            page(&[1], 1),
            Err(ApiError::Http {
                status: 503,
                message: "database unavailable".to_string(),
            }),
            page(&[2, 1], 2),
        ]);
        engine.fetch(FetchTrigger::User).await;
        engine.start_auto_refresh(5);

        run_until_fetched(&mut engine, &mut rx).await;
        assert!(engine.refresh_state().enabled);
        assert_eq!(engine.rows().len(), 1);
        assert_eq!(engine.error(), Some("database unavailable"));
        assert_eq!(engine.api().request_count(), 2);

        run_until_fetched(&mut engine, &mut rx).await;
        assert!(engine.refresh_state().enabled);
        assert_eq!(engine.api().request_count(), 3);
        assert_eq!(engine.rows().len(), 2);
        assert_eq!(engine.error(), None);
        engine.shutdown();
    }

    #[tokio::test]
    async fn test_selection_survives_refetch() {
        let (mut engine, _rx) = engine(vec![page(&[1, 2], 2), page(&[3], 1)]);
        engine.fetch(FetchTrigger::User).await;
        engine.toggle_select_all();
        assert_eq!(engine.selected_count(), 2);
        assert_eq!(engine.selected_rows().len(), 2);

        engine.fetch(FetchTrigger::User).await;
        assert_eq!(engine.selected_count(), 2);
        assert!(engine.selected_rows().is_empty());

        engine.prune_selection();
        assert_eq!(engine.selected_count(), 0);
    }

    #[tokio::test]
    async fn test_filter_options() {
        let (mut engine, _rx) = engine(vec![]);
        engine.fetch_filter_options().await;
        let options = engine.filter_options();
        assert_eq!(options.hosts, vec!["a", "b"]);
        assert_eq!(options.severities[0].label, "Error");
        assert_eq!(options.facilities[0].val, 4);
    }

    #[tokio::test]
    async fn test_filter_options_failure_is_ignored() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let api = FakeApi {
            meta_fails: true,
            ..FakeApi::default()
        };
        let mut engine = LogQueryEngine::new(api, EngineOptions::default(), tx);
        engine.fetch_filter_options().await;
        assert_eq!(engine.filter_options(), &FilterOptions::default());
        assert_eq!(engine.error(), None);
    }

    #[test]
    fn test_detail_panel() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut engine = LogQueryEngine::new(FakeApi::default(), EngineOptions::default(), tx);
        engine.open_detail(LogEntry::new(9));
        assert_eq!(engine.detail().map(LogEntry::id), Some(LogId(9)));
        engine.close_detail();
        assert!(engine.detail().is_none());
    }
}
