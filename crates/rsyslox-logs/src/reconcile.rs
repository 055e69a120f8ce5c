use std::collections::HashSet;
use std::time::Duration;

use tokio::time::Instant;

use rsyslox_types::{LogEntry, LogId};

/// What caused a fetch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchTrigger {
    /// Filter, time window, paging or manual reload
    User,
    /// Periodic poll from the auto-refresh scheduler
    AutoRefresh,
}

/// Ids in `next` that were not in `previous`.
///
/// Only auto-refresh polls between two non-empty result sets produce
/// anything: a changed query is a different result set, not new arrivals.
pub fn fresh_ids(previous: &[LogEntry], next: &[LogEntry], trigger: FetchTrigger) -> HashSet<LogId> {
    if trigger != FetchTrigger::AutoRefresh || previous.is_empty() || next.is_empty() {
        return HashSet::new();
    }

    let seen: HashSet<LogId> = previous.iter().map(LogEntry::id).collect();
    next.iter()
        .map(LogEntry::id)
        .filter(|id| !seen.contains(id))
        .collect()
}

/// Transient set of newly arrived rows
#[derive(Clone, Debug, Default)]
pub struct Highlight {
    ids: HashSet<LogId>,
    expires_at: Option<Instant>,
}

impl Highlight {
    /// Advertise `ids` until `duration` from now
    pub fn flash(&mut self, ids: HashSet<LogId>, duration: Duration) {
        if ids.is_empty() {
            return;
        }
        self.ids = ids;
        self.expires_at = Some(Instant::now() + duration);
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.expires_at = None;
    }

    fn is_live(&self) -> bool {
        self.expires_at.is_some_and(|deadline| Instant::now() < deadline)
    }

    /// Highlighted ids, empty once the window has passed
    pub fn ids(&self) -> HashSet<LogId> {
        if self.is_live() {
            self.ids.clone()
        } else {
            HashSet::new()
        }
    }

    pub fn contains(&self, id: LogId) -> bool {
        self.is_live() && self.ids.contains(&id)
    }

    /// When the current highlight lapses
    pub fn deadline(&self) -> Option<Instant> {
        self.expires_at.filter(|_| self.is_live())
    }
}
