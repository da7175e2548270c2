//! Queue of file change events shared with the notification source.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A change reported for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileEvent {
    Created(String),
    Updated(String),
    Deleted(String),
}

impl FileEvent {
    pub fn path(&self) -> &str {
        match self {
            FileEvent::Created(p) | FileEvent::Updated(p) | FileEvent::Deleted(p) => p,
        }
    }
}

/// Mutex-guarded FIFO. Producers push from any thread; the scheduler drains
/// it without blocking.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Mutex<VecDeque<FileEvent>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: FileEvent) {
        self.events.lock().push_back(event);
    }

    /// Put events back at the front, keeping their order.
    pub fn push_front_all(&self, events: Vec<FileEvent>) {
        let mut queue = self.events.lock();
        for event in events.into_iter().rev() {
            queue.push_front(event);
        }
    }

    /// Take every queued event.
    pub fn drain(&self) -> Vec<FileEvent> {
        self.events.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requeue_keeps_order() {
        let queue = EventQueue::new();
        queue.push(FileEvent::Created("/c".into()));

        queue.push_front_all(vec![
            FileEvent::Deleted("/a".into()),
            FileEvent::Updated("/b".into()),
        ]);

        let events = queue.drain();
        let paths: Vec<_> = events.iter().map(|e| e.path()).collect();
        assert_eq!(paths, ["/a", "/b", "/c"]);
        assert!(queue.is_empty());
    }
}
