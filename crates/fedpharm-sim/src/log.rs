//! Bounded session log. Keeps the most recent `capacity` entries and mirrors
//! each one to `tracing`.

use std::collections::VecDeque;

use fedpharm_common::{LogEntry, LogLevel};
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    unread: usize,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { entries: VecDeque::with_capacity(capacity), capacity, unread: 0 }
    }

    /// Append an entry stamped with the current time; evicts the oldest
    /// entry once full. Returns a copy for event fan-out.
    pub fn push(&mut self, level: LogLevel, message: impl Into<String>) -> LogEntry {
        let entry = LogEntry::now(level, message);
        match level {
            LogLevel::Info | LogLevel::Success => info!(target: "fedpharm::session", kind = level.as_str(), "{}", entry.message),
            LogLevel::Warn => warn!(target: "fedpharm::session", "{}", entry.message),
            LogLevel::Error => error!(target: "fedpharm::session", "{}", entry.message),
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry.clone());
        self.unread = (self.unread + 1).min(self.capacity);
        entry
    }

    /// Entries appended since the previous call, oldest first.
    pub fn take_new(&mut self) -> Vec<LogEntry> {
        let skip = self.entries.len() - self.unread;
        self.unread = 0;
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn info(&mut self, message: impl Into<String>) -> LogEntry {
        self.push(LogLevel::Info, message)
    }

    pub fn success(&mut self, message: impl Into<String>) -> LogEntry {
        self.push(LogLevel::Success, message)
    }

    pub fn warn(&mut self, message: impl Into<String>) -> LogEntry {
        self.push(LogLevel::Warn, message)
    }

    pub fn error(&mut self, message: impl Into<String>) -> LogEntry {
        self.push(LogLevel::Error, message)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// Oldest-first copy of the retained entries.
    pub fn to_vec(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retains_most_recent_101_of_150() {
        let mut log = LogBuffer::new(101);
        for i in 0..150 {
            log.info(format!("entry {i}"));
        }
        assert_eq!(log.len(), 101);
        let messages: Vec<_> = log.iter().map(|e| e.message.clone()).collect();
        assert_eq!(messages.first().map(String::as_str), Some("entry 49"));
        assert_eq!(messages.last().map(String::as_str), Some("entry 149"));
        let expected: Vec<String> = (49..150).map(|i| format!("entry {i}")).collect();
        assert_eq!(messages, expected);
    }

    #[test]
    fn test_take_new_returns_only_fresh_entries() {
        let mut log = LogBuffer::new(3);
        log.info("a");
        assert_eq!(log.take_new().len(), 1);
        log.info("b");
        log.info("c");
        log.info("d");
        log.info("e");
        let fresh: Vec<_> = log.take_new().into_iter().map(|e| e.message).collect();
        assert_eq!(fresh, vec!["c", "d", "e"]);
        assert!(log.take_new().is_empty());
    }

    #[test]
    fn test_levels_are_recorded() {
        let mut log = LogBuffer::new(4);
        log.warn("w");
        log.success("s");
        let levels: Vec<_> = log.iter().map(|e| e.level).collect();
        assert_eq!(levels, vec![LogLevel::Warn, LogLevel::Success]);
    }
}
