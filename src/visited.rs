use std::{collections::HashSet, sync::Arc};

use parking_lot::Mutex;

/// Set of URLs that some task has already claimed for exploration.
///
/// Cloning is cheap and every clone shares the same underlying set.
#[derive(Debug, Clone, Default)]
pub struct VisitedSet {
    entries: Arc<Mutex<HashSet<String>>>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `url` as visited.
    ///
    /// Returns `true` if it was already present, in which case the caller
    /// must not explore it. Returns `false` when this call inserted it and the
    /// caller now owns exploring it. Test and insert happen under one lock, so
    /// at most one caller ever sees `false` for a given URL.
    pub fn visit(&self, url: &str) -> bool {
        let mut entries = self.entries.lock();
        if entries.contains(url) {
            return true;
        }
        entries.insert(url.to_owned());
        false
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries.lock().contains(url)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Sorted copy of every visited URL.
    pub fn snapshot(&self) -> Vec<String> {
        let mut urls: Vec<String> = self.entries.lock().iter().cloned().collect();
        urls.sort();
        urls
    }
}
