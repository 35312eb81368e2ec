//! Bounded LRU cache of per-contract domain configuration, keyed by
//! address. Directly generalises the teacher's `BoundedHashCache` (TTL +
//! max-size, oldest-evicted-on-insert) to an address key and an arbitrary
//! cached value instead of a plain hash marker.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use paladin_types::EvmAddress;

pub struct ContractCache<T> {
    map: HashMap<EvmAddress, (T, Instant)>,
    capacity: usize,
    ttl: Duration,
}

impl<T: Clone> ContractCache<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            map: HashMap::new(),
            capacity,
            ttl: Duration::from_secs(3600),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn get(&self, address: &EvmAddress) -> Option<T> {
        self.map
            .get(address)
            .filter(|(_, t)| t.elapsed() < self.ttl)
            .map(|(v, _)| v.clone())
    }

    pub fn insert(&mut self, address: EvmAddress, value: T) {
        let now = Instant::now();
        self.map.retain(|_, (_, t)| now.duration_since(*t) < self.ttl);
        while self.map.len() >= self.capacity && !self.map.is_empty() {
            let oldest = self
                .map
                .iter()
                .min_by_key(|(_, (_, t))| *t)
                .map(|(addr, _)| *addr);
            if let Some(addr) = oldest {
                self.map.remove(&addr);
            } else {
                break;
            }
        }
        self.map.insert(address, (value, now));
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> EvmAddress {
        EvmAddress([n; 20])
    }

    #[test]
    fn inserts_and_reads_back() {
        let mut cache: ContractCache<u32> = ContractCache::new(2);
        cache.insert(addr(1), 100);
        assert_eq!(cache.get(&addr(1)), Some(100));
    }

    #[test]
    fn evicts_oldest_at_capacity() {
        let mut cache: ContractCache<u32> = ContractCache::new(1);
        cache.insert(addr(1), 100);
        cache.insert(addr(2), 200);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&addr(1)), None);
        assert_eq!(cache.get(&addr(2)), Some(200));
    }

    #[test]
    fn default_capacity_matches_spec() {
        let cache: ContractCache<u32> = ContractCache::new(1000);
        assert_eq!(cache.capacity, 1000);
    }
}
