//! Bounded, newest-first slow-command log. Mirrors Redis's `SLOWLOG`
//! surface: `GET`, `LEN`, `RESET`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

const DEFAULT_CAPACITY: usize = 128;
pub const SLOWLOG_THRESHOLD: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct SlowLogEntry {
    pub id: i64,
    pub timestamp_secs: i64,
    pub duration_micros: i64,
    pub command: Vec<Vec<u8>>,
}

pub struct SlowLog {
    capacity: usize,
    entries: Mutex<VecDeque<SlowLogEntry>>,
    next_id: AtomicI64,
}

impl SlowLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { capacity, entries: Mutex::new(VecDeque::new()), next_id: AtomicI64::new(0) }
    }

    /// Records a command if `duration >= SLOWLOG_THRESHOLD`, evicting the
    /// oldest entry once at capacity.
    pub fn record(&self, duration: Duration, command: Vec<Vec<u8>>) {
        if duration < SLOWLOG_THRESHOLD {
            return;
        }
        let entry = SlowLogEntry {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            timestamp_secs: now_unix_secs(),
            duration_micros: duration.as_micros() as i64,
            command,
        };
        let mut entries = self.entries.lock().unwrap();
        entries.push_front(entry);
        if entries.len() > self.capacity {
            entries.pop_back();
        }
    }

    pub fn get(&self, count: Option<usize>) -> Vec<SlowLogEntry> {
        let entries = self.entries.lock().unwrap();
        match count {
            Some(n) => entries.iter().take(n).cloned().collect(),
            None => entries.iter().cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn reset(&self) {
        self.entries.lock().unwrap().clear();
    }
}

impl Default for SlowLog {
    fn default() -> Self {
        Self::new()
    }
}

fn now_unix_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_commands_are_not_recorded() {
        let log = SlowLog::new();
        log.record(Duration::from_millis(1), vec![b"GET".to_vec()]);
        assert_eq!(log.len(), 0);
    }

    #[test]
    fn caps_at_capacity_dropping_oldest() {
        let log = SlowLog::with_capacity(2);
        log.record(Duration::from_millis(20), vec![b"CMD1".to_vec()]);
        log.record(Duration::from_millis(20), vec![b"CMD2".to_vec()]);
        log.record(Duration::from_millis(20), vec![b"CMD3".to_vec()]);
        let entries = log.get(None);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].command, vec![b"CMD3".to_vec()]);
        assert_eq!(entries[1].command, vec![b"CMD2".to_vec()]);
    }

    #[test]
    fn reset_clears_entries() {
        let log = SlowLog::new();
        log.record(Duration::from_millis(20), vec![b"CMD".to_vec()]);
        log.reset();
        assert_eq!(log.len(), 0);
    }
}
