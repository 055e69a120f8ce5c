use std::collections::HashSet;

use rsyslox_types::{LogEntry, LogId};

/// Selected row ids.
///
/// Ids survive page navigation and refetches; rows that drop out of the
/// loaded set stay selected until [`Selection::retain_loaded`] or
/// [`Selection::clear`] is called.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    ids: HashSet<LogId>,
}

impl Selection {
    /// Flip membership of `id`. Returns true if it is now selected.
    pub fn toggle(&mut self, id: LogId) -> bool {
        if self.ids.remove(&id) {
            false
        } else {
            self.ids.insert(id);
            true
        }
    }

    /// Select every loaded row, or clear if they are all selected already
    pub fn toggle_all(&mut self, loaded: &[LogEntry]) {
        if loaded.iter().all(|e| self.ids.contains(&e.id())) {
            self.ids.clear();
        } else {
            self.ids = loaded.iter().map(LogEntry::id).collect();
        }
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Drop ids that are not in `loaded`
    pub fn retain_loaded(&mut self, loaded: &[LogEntry]) {
        let present: HashSet<LogId> = loaded.iter().map(LogEntry::id).collect();
        self.ids.retain(|id| present.contains(id));
    }

    pub fn contains(&self, id: LogId) -> bool {
        self.ids.contains(&id)
    }

    pub fn ids(&self) -> &HashSet<LogId> {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Loaded rows that are selected, in row order
    pub fn selected_rows<'a>(&self, loaded: &'a [LogEntry]) -> Vec<&'a LogEntry> {
        loaded.iter().filter(|e| self.ids.contains(&e.id())).collect()
    }
}
