//! The ingestion buffer: dedup, recent cache, and the pending batch.

use postrelay_core::Post;
use tracing::debug;

use crate::cache::RecentCache;
use crate::dedup::SeenSet;

/// Pending-buffer size that triggers an immediate flush.
pub const BATCH_SIZE: usize = 50;

// ============================================================================
// Enqueue Outcome
// ============================================================================

/// Result of one enqueue call.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnqueueOutcome {
    /// Newly accepted records appended to the pending buffer.
    pub accepted: usize,
    /// Records skipped as duplicates.
    pub duplicates: usize,
    /// Whether the buffer reached the batch threshold and an immediate
    /// flush is due.
    pub flush_due: bool,
}

// ============================================================================
// Ingest Buffer
// ============================================================================

/// Owns the dedup set, the recent-post cache, and the pending buffer.
#[derive(Debug)]
pub struct IngestBuffer {
    seen: SeenSet,
    recent: RecentCache,
    pending: Vec<Post>,
    batch_size: usize,
    session_count: u64,
}

impl IngestBuffer {
    /// Creates a buffer with default ceilings.
    pub fn new() -> Self {
        Self {
            seen: SeenSet::default(),
            recent: RecentCache::default(),
            pending: Vec::new(),
            batch_size: BATCH_SIZE,
            session_count: 0,
        }
    }

    /// Overrides the dedup set and batch threshold (tests, tooling).
    pub fn with_limits(seen_ceiling: usize, recent_ceiling: usize, batch_size: usize) -> Self {
        Self {
            seen: SeenSet::new(seen_ceiling),
            recent: RecentCache::new(recent_ceiling),
            pending: Vec::new(),
            batch_size,
            session_count: 0,
        }
    }

    /// Rebuilds the dedup set from a persisted snapshot.
    pub fn restore_seen(&mut self, ids: impl IntoIterator<Item = String>) {
        self.seen.restore(ids);
    }

    /// Enqueues captured records.
    ///
    /// Every record with an id lands in the recent cache regardless of
    /// dedup outcome — the cache answers "latest known state", a different
    /// question than delivery dedup. Records then pass the dedup filter
    /// unless they are article enrichments, which always pass: a later
    /// article capture carries content the first-sighted stub did not.
    pub fn enqueue(&mut self, posts: Vec<Post>) -> EnqueueOutcome {
        let total = posts.len();
        let mut accepted = 0usize;

        for post in posts {
            if let Some(id) = &post.id {
                self.recent.insert(id.clone(), post.clone());

                if self.seen.contains(id) && !post.is_article {
                    continue;
                }
                self.seen.insert(id.clone());
            }
            self.pending.push(post);
            accepted += 1;
        }

        let duplicates = total - accepted;
        if duplicates > 0 {
            debug!(
                accepted,
                duplicates,
                seen = self.seen.len(),
                "Dedup filtered incoming records"
            );
        }
        self.session_count += accepted as u64;

        EnqueueOutcome {
            accepted,
            duplicates,
            flush_due: self.pending.len() >= self.batch_size,
        }
    }

    /// Atomically removes the entire pending buffer as one batch.
    pub fn take_batch(&mut self) -> Vec<Post> {
        std::mem::take(&mut self.pending)
    }

    /// Re-inserts a failed batch at the front of the buffer, preserving its
    /// original relative order, so it is retried before newer records.
    pub fn restore_batch(&mut self, mut batch: Vec<Post>) {
        batch.append(&mut self.pending);
        self.pending = batch;
    }

    /// Latest known record for an id.
    pub fn recent(&self, id: &str) -> Option<&Post> {
        self.recent.get(id)
    }

    /// Number of records awaiting delivery.
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    /// Records accepted this session.
    pub fn session_count(&self) -> u64 {
        self.session_count
    }

    /// Oldest-first snapshot of the dedup set.
    pub fn seen_snapshot(&self) -> Vec<String> {
        self.seen.snapshot()
    }
}

impl Default for IngestBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn post(id: &str) -> Post {
        Post {
            id: Some(id.to_string()),
            text: format!("text {id}"),
            ..Post::default()
        }
    }

    fn article(id: &str) -> Post {
        Post {
            is_article: true,
            ..post(id)
        }
    }

    #[test]
    fn test_same_id_twice_buffers_once() {
        let mut buffer = IngestBuffer::new();
        let outcome = buffer.enqueue(vec![post("1"), post("1")]);

        assert_eq!(outcome.accepted, 1);
        assert_eq!(outcome.duplicates, 1);
        assert_eq!(buffer.buffered(), 1);
        assert_eq!(buffer.session_count(), 1);
    }

    #[test]
    fn test_article_enrichment_bypasses_dedup() {
        let mut buffer = IngestBuffer::new();
        buffer.enqueue(vec![post("1")]);
        let outcome = buffer.enqueue(vec![article("1")]);

        assert_eq!(outcome.accepted, 1);
        assert_eq!(buffer.buffered(), 2);
    }

    #[test]
    fn test_recent_cache_updates_on_duplicates() {
        let mut buffer = IngestBuffer::new();
        buffer.enqueue(vec![post("1")]);

        let mut updated = post("1");
        updated.text = "richer".to_string();
        buffer.enqueue(vec![updated]);

        // The duplicate was not re-buffered but the cache has latest data.
        assert_eq!(buffer.buffered(), 1);
        assert_eq!(buffer.recent("1").unwrap().text, "richer");
    }

    #[test]
    fn test_records_without_id_skip_dedup() {
        let mut buffer = IngestBuffer::new();
        let anonymous = Post::default();
        let outcome = buffer.enqueue(vec![anonymous.clone(), anonymous]);

        assert_eq!(outcome.accepted, 2);
        assert_eq!(buffer.buffered(), 2);
    }

    #[test]
    fn test_batch_threshold_triggers_flush() {
        let mut buffer = IngestBuffer::with_limits(100, 10, 3);
        assert!(!buffer.enqueue(vec![post("1"), post("2")]).flush_due);
        assert!(buffer.enqueue(vec![post("3")]).flush_due);
    }

    #[test]
    fn test_restore_batch_prepends_in_order() {
        let mut buffer = IngestBuffer::new();
        buffer.enqueue(vec![post("1"), post("2")]);
        let batch = buffer.take_batch();
        assert_eq!(buffer.buffered(), 0);

        // New records arrive while the batch is in flight.
        buffer.enqueue(vec![post("3")]);
        buffer.restore_batch(batch);

        let ids: Vec<_> = buffer
            .take_batch()
            .into_iter()
            .map(|p| p.id.unwrap())
            .collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_evicted_id_is_recapturable() {
        let mut buffer = IngestBuffer::with_limits(2, 10, 100);
        buffer.enqueue(vec![post("1"), post("2"), post("3")]);
        // "1" fell out of the dedup set, so a re-capture is accepted again.
        let outcome = buffer.enqueue(vec![post("1")]);
        assert_eq!(outcome.accepted, 1);
    }
}
