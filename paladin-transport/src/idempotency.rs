//! Bounded, TTL'd cache of idempotency keys already handled by this node.
//!
//! Every engine handler on the receiving side of the transport must be
//! idempotent keyed by `{transaction_id, stage, idempotency_key}` (spec
//! section 4.7). This cache lets a handler cheaply recognise a duplicate
//! delivery without re-running side effects.

use std::collections::HashMap;
use std::time::{Duration, Instant};

pub struct IdempotencyCache {
    seen: HashMap<String, Instant>,
    max_size: usize,
    ttl: Duration,
}

impl IdempotencyCache {
    pub fn new(max_size: usize, ttl_secs: u64) -> Self {
        Self {
            seen: HashMap::new(),
            max_size,
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    /// Returns `true` if this key was already recorded (i.e. this delivery
    /// is a duplicate); otherwise records it and returns `false`.
    pub fn check_and_record(&mut self, key: &str) -> bool {
        let now = Instant::now();
        if self.seen.get(key).is_some_and(|&t| now.duration_since(t) < self.ttl) {
            return true;
        }

        self.seen.retain(|_, &mut t| now.duration_since(t) < self.ttl);
        while self.seen.len() >= self.max_size && !self.seen.is_empty() {
            if let Some(oldest) = self.seen.iter().min_by_key(|(_, t)| **t).map(|(k, _)| k.clone()) {
                self.seen.remove(&oldest);
            } else {
                break;
            }
        }
        self.seen.insert(key.to_string(), now);
        false
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_delivery_is_not_a_duplicate() {
        let mut cache = IdempotencyCache::new(10, 60);
        assert!(!cache.check_and_record("a"));
    }

    #[test]
    fn repeated_key_is_a_duplicate() {
        let mut cache = IdempotencyCache::new(10, 60);
        assert!(!cache.check_and_record("a"));
        assert!(cache.check_and_record("a"));
    }

    #[test]
    fn evicts_oldest_at_capacity() {
        let mut cache = IdempotencyCache::new(2, 60);
        cache.check_and_record("a");
        cache.check_and_record("b");
        cache.check_and_record("c");
        assert_eq!(cache.len(), 2);
        assert!(!cache.check_and_record("a"));
    }
}
