use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub term: u64,
    pub value: String,
    pub committed: bool,
}

impl LogEntry {
    pub fn new(term: u64, value: impl Into<String>) -> Self {
        Self {
            term,
            value: value.into(),
            committed: false,
        }
    }
}

/// In-memory replicated log together with its commit point.
///
/// `commit_index` is `-1` while nothing is committed and always stays below
/// `len()`. Entries at or below it carry `committed = true`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Log {
    entries: Vec<LogEntry>,
    commit_index: i64,
}

impl Default for Log {
    fn default() -> Self {
        Self::new()
    }
}

impl Log {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            commit_index: -1,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the last entry, `-1` for an empty log.
    pub fn last_index(&self) -> i64 {
        self.entries.len() as i64 - 1
    }

    pub fn term_at(&self, index: i64) -> Option<u64> {
        if index < 0 {
            return None;
        }
        self.entries.get(index as usize).map(|e| e.term)
    }

    pub fn commit_index(&self) -> i64 {
        self.commit_index
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn get_entry(&self, index: usize) -> Option<&LogEntry> {
        self.entries.get(index)
    }

    /// Appends an uncommitted entry and returns its index.
    pub fn append(&mut self, term: u64, value: impl Into<String>) -> usize {
        self.entries.push(LogEntry::new(term, value));
        self.entries.len() - 1
    }

    /// Number of leading positions where our entries equal `incoming`'s in
    /// both term and value.
    pub fn matching_prefix(&self, incoming: &[LogEntry]) -> usize {
        self.entries
            .iter()
            .zip(incoming.iter())
            .take_while(|(ours, theirs)| ours.term == theirs.term && ours.value == theirs.value)
            .count()
    }

    /// Replaces the whole log with `incoming` if it is strictly longer.
    ///
    /// No index/term reconciliation happens here. Returns the number of
    /// pre-existing positions that differed from the incoming entry,
    /// or `None` if the incoming log was not adopted.
    pub fn adopt_if_longer(&mut self, incoming: &[LogEntry]) -> Option<usize> {
        if incoming.len() <= self.entries.len() {
            return None;
        }

        let divergent = self
            .entries
            .iter()
            .zip(incoming.iter())
            .filter(|(ours, theirs)| ours.term != theirs.term || ours.value != theirs.value)
            .count();

        self.entries = incoming.to_vec();
        // Commit flags follow our own commit point, not the sender's.
        let commit = self.commit_index;
        for (i, entry) in self.entries.iter_mut().enumerate() {
            entry.committed = (i as i64) <= commit;
        }

        Some(divergent)
    }

    /// Raises the commit index towards `target`, clamped to the last index.
    ///
    /// Never lowers it. Returns true if it moved.
    pub fn commit_to(&mut self, target: i64) -> bool {
        let target = target.min(self.last_index());
        if target <= self.commit_index {
            return false;
        }

        self.commit_index = target;
        for entry in self.entries.iter_mut().take(target as usize + 1) {
            entry.committed = true;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_log_is_empty_with_no_commit() {
        let log = Log::new();
        assert!(log.is_empty());
        assert_eq!(log.last_index(), -1);
        assert_eq!(log.commit_index(), -1);
        assert_eq!(log.term_at(0), None);
        assert_eq!(log.term_at(-1), None);
    }

    #[test]
    fn append_returns_index_and_leaves_entry_uncommitted() {
        let mut log = Log::new();
        assert_eq!(log.append(1, "x=1"), 0);
        assert_eq!(log.append(2, "y=2"), 1);
        assert_eq!(log.last_index(), 1);
        assert_eq!(log.term_at(1), Some(2));
        assert!(!log.get_entry(0).unwrap().committed);
    }

    #[test]
    fn commit_to_is_clamped_and_monotonic() {
        let mut log = Log::new();
        log.append(1, "a");
        log.append(1, "b");

        assert!(log.commit_to(7));
        assert_eq!(log.commit_index(), 1);
        assert!(log.entries().iter().all(|e| e.committed));

        assert!(!log.commit_to(0));
        assert_eq!(log.commit_index(), 1);
    }

    #[test]
    fn commit_to_on_empty_log_does_nothing() {
        let mut log = Log::new();
        assert!(!log.commit_to(3));
        assert_eq!(log.commit_index(), -1);
    }

    #[test]
    fn matching_prefix_stops_at_first_difference() {
        let mut log = Log::new();
        log.append(1, "a");
        log.append(1, "b");
        log.append(2, "c");

        let same = log.entries().to_vec();
        assert_eq!(log.matching_prefix(&same), 3);
        assert_eq!(log.matching_prefix(&same[..1]), 1);
        assert_eq!(log.matching_prefix(&[]), 0);

        let forked = vec![LogEntry::new(1, "a"), LogEntry::new(2, "b")];
        assert_eq!(log.matching_prefix(&forked), 1);
        assert_eq!(log.matching_prefix(&[LogEntry::new(2, "x")]), 0);
    }

    #[test]
    fn adopt_only_replaces_with_longer_log() {
        let mut log = Log::new();
        log.append(1, "a");
        log.append(1, "b");

        let shorter = vec![LogEntry::new(3, "z")];
        assert_eq!(log.adopt_if_longer(&shorter), None);
        assert_eq!(log.len(), 2);

        let longer = vec![
            LogEntry::new(1, "a"),
            LogEntry::new(2, "c"),
            LogEntry::new(2, "d"),
        ];
        assert_eq!(log.adopt_if_longer(&longer), Some(1));
        assert_eq!(log.len(), 3);
        assert_eq!(log.get_entry(1).unwrap().value, "c");
    }

    #[test]
    fn adopted_entries_follow_local_commit_point() {
        let mut log = Log::new();
        log.append(1, "a");
        log.commit_to(0);

        let mut incoming = vec![LogEntry::new(1, "a"), LogEntry::new(1, "b")];
        incoming[1].committed = true;

        log.adopt_if_longer(&incoming);
        assert!(log.get_entry(0).unwrap().committed);
        assert!(!log.get_entry(1).unwrap().committed);
        assert!(log.commit_index() < log.len() as i64);
    }
}
