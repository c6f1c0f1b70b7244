//! Bounded query history, newest first.

use crate::models::HistoryItem;
use std::collections::VecDeque;
use std::sync::Mutex;

pub struct HistoryStore {
    capacity: usize,
    items: Mutex<VecDeque<HistoryItem>>,
}

impl HistoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Record an item, dropping the oldest once capacity is reached.
    pub fn append(&self, item: HistoryItem) {
        if self.capacity == 0 {
            return;
        }
        let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        items.push_front(item);
        items.truncate(self.capacity);
    }

    pub fn list(&self) -> Vec<HistoryItem> {
        let items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        items.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(question: &str) -> HistoryItem {
        HistoryItem {
            question: question.to_string(),
            sql: "SELECT * FROM orders LIMIT 50;".to_string(),
            executed_at: Utc::now(),
            rowcount: 3,
            warnings: vec![],
        }
    }

    #[test]
    fn test_newest_first() {
        let history = HistoryStore::new(10);
        history.append(item("first"));
        history.append(item("second"));
        let questions: Vec<String> = history.list().into_iter().map(|i| i.question).collect();
        assert_eq!(questions, vec!["second", "first"]);
    }

    #[test]
    fn test_oldest_evicted_at_capacity() {
        let history = HistoryStore::new(3);
        for i in 0..7 {
            history.append(item(&format!("q{}", i)));
            assert!(history.len() <= 3);
        }
        let questions: Vec<String> = history.list().into_iter().map(|i| i.question).collect();
        assert_eq!(questions, vec!["q6", "q5", "q4"]);
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let history = HistoryStore::new(0);
        history.append(item("q"));
        assert!(history.is_empty());
    }
}
