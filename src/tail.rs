//! Tracks which rows `tail` has already printed

use std::collections::HashSet;

use rsyslox_logs::{LogEntry, LogId};

/// Remembers the ids printed from the latest result set
#[derive(Debug, Default)]
pub struct TailCursor {
    printed: HashSet<LogId>,
}

impl TailCursor {
    /// Rows not printed yet, oldest first. Rows arrive newest first.
    ///
    /// Only ids from `rows` are remembered afterwards, so the set stays the
    /// size of one result page.
    pub fn advance<'a>(&mut self, rows: &'a [LogEntry]) -> Vec<&'a LogEntry> {
        let unseen = rows
            .iter()
            .rev()
            .filter(|row| !self.printed.contains(&row.id()))
            .collect();
        self.printed = rows.iter().map(LogEntry::id).collect();
        unseen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(ids: &[i64]) -> Vec<LogEntry> {
        ids.iter().map(|id| LogEntry::new(*id)).collect()
    }

    fn ids(rows: Vec<&LogEntry>) -> Vec<i64> {
        rows.into_iter().map(|r| r.id().0).collect()
    }

    #[test]
    fn test_first_batch_prints_everything_oldest_first() {
        let mut cursor = TailCursor::default();
        assert_eq!(ids(cursor.advance(&rows(&[3, 2, 1]))), vec![1, 2, 3]);
    }

    #[test]
    fn test_rows_after_an_empty_window_are_printed() {
        let mut cursor = TailCursor::default();
        assert!(cursor.advance(&[]).is_empty());
        assert_eq!(ids(cursor.advance(&rows(&[2, 1]))), vec![1, 2]);
    }

    #[test]
    fn test_only_new_rows_on_later_polls() {
        let mut cursor = TailCursor::default();
        cursor.advance(&rows(&[2, 1]));
        assert_eq!(ids(cursor.advance(&rows(&[4, 3, 2]))), vec![3, 4]);
        assert!(cursor.advance(&rows(&[4, 3, 2])).is_empty());
    }
}
