//! The recent-post cache.

use postrelay_core::Post;
use std::collections::{HashMap, VecDeque};

/// Ceiling of the recent-post cache. Deliberately smaller than the dedup
/// ceiling: it serves point lookups, not delivery dedup.
pub const MAX_RECENT_POSTS: usize = 1_000;

/// A bounded id→post map holding the latest full record per id.
///
/// Serves synchronous lookups from the control surface (e.g. "does this
/// post have a video"). Every capture overwrites the stored record, dupes
/// included, so lookups always see the latest data; eviction is FIFO by
/// first insertion and independent of the dedup set.
#[derive(Debug)]
pub struct RecentCache {
    ceiling: usize,
    order: VecDeque<String>,
    map: HashMap<String, Post>,
}

impl RecentCache {
    /// Creates a cache with the given ceiling.
    pub fn new(ceiling: usize) -> Self {
        Self {
            ceiling,
            order: VecDeque::new(),
            map: HashMap::new(),
        }
    }

    /// Inserts or overwrites the record for an id.
    pub fn insert(&mut self, id: String, post: Post) {
        if self.map.insert(id.clone(), post).is_none() {
            self.order.push_back(id);
            while self.map.len() > self.ceiling {
                if let Some(oldest) = self.order.pop_front() {
                    self.map.remove(&oldest);
                } else {
                    break;
                }
            }
        }
    }

    /// Looks up the latest record for an id.
    pub fn get(&self, id: &str) -> Option<&Post> {
        self.map.get(id)
    }

    /// Number of cached records.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Default for RecentCache {
    fn default() -> Self {
        Self::new(MAX_RECENT_POSTS)
    }
}

// ============================================================================
// Tests
// ============================================================================
