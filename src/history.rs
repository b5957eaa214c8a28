//! A bounded, circular log of accepted input lines.

/// Number of lines retained by default.
pub const DEFAULT_CAPACITY: usize = 500;

/// Fixed-capacity history of input lines.
///
/// Once full, each new line evicts the oldest retained one, while a running
/// total keeps the absolute sequence numbers stable: the oldest surviving
/// entry is always numbered `total - len + 1`.
#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<String>,
    capacity: usize,
    /// Logical index of the oldest retained entry once the buffer is full.
    start: usize,
    /// Count of every line ever accepted, including evicted ones.
    total: u64,
}

impl History {
    /// Creates an empty history with the given fixed capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "history capacity must be non-zero");
        History {
            entries: Vec::new(),
            capacity,
            start: 0,
            total: 0,
        }
    }

    /// Records one input line, keeping an owned copy.
    ///
    /// Empty and all-whitespace lines are ignored entirely: neither the
    /// retained entries nor the running total change.
    pub fn add(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        let line = line.to_owned();
        if self.entries.len() < self.capacity {
            self.entries.push(line);
        } else {
            // Full: overwrite the oldest entry and advance the start offset.
            self.entries[self.start] = line;
            self.start = (self.start + 1) % self.capacity;
        }
        self.total += 1;
    }

    /// Number of currently retained lines, at most the capacity.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of lines ever accepted, including evicted ones.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Iterates over the retained lines oldest first, pairing each with its
    /// absolute, 1-based sequence number.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &str)> {
        let first = self.total - self.entries.len() as u64 + 1;
        let start = self.start;
        let capacity = self.capacity;
        (0..self.entries.len())
            .map(move |i| (first + i as u64, self.entries[(start + i) % capacity].as_str()))
    }
}

impl Default for History {
    fn default() -> Self {
        History::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(history: &History) -> Vec<(u64, String)> {
        history.iter().map(|(n, s)| (n, s.to_string())).collect()
    }

    #[test]
    fn blank_lines_are_ignored() {
        let mut history = History::new(4);
        history.add("");
        history.add("   ");
        history.add("\t\n");
        assert_eq!(history.len(), 0);
        assert_eq!(history.total(), 0);
    }

    #[test]
    fn keeps_insertion_order_with_sequence_numbers() {
        let mut history = History::new(4);
        history.add("first");
        history.add("second");
        assert_eq!(
            lines(&history),
            [(1, "first".to_string()), (2, "second".to_string())]
        );
        assert_eq!(history.total(), 2);
    }

    #[test]
    fn evicts_oldest_once_full() {
        let capacity = 3;
        let mut history = History::new(capacity);
        for i in 1..=capacity + 1 {
            history.add(&format!("cmd{i}"));
        }
        assert_eq!(history.len(), capacity);
        assert_eq!(history.total(), capacity as u64 + 1);
        // The 1st insert is gone; the 2nd survives and keeps number 2.
        let entries = lines(&history);
        assert_eq!(entries[0], (2, "cmd2".to_string()));
        assert_eq!(entries.last(), Some(&(4, "cmd4".to_string())));
    }

    #[test]
    fn wraps_around_repeatedly() {
        let mut history = History::new(2);
        for i in 1..=7 {
            history.add(&format!("{i}"));
        }
        assert_eq!(
            lines(&history),
            [(6, "6".to_string()), (7, "7".to_string())]
        );
    }

    #[test]
    #[should_panic(expected = "capacity must be non-zero")]
    fn zero_capacity_panics() {
        History::new(0);
    }
}
