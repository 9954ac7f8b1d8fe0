//! Concurrent result cache keyed by `(start, end, scenario)`, bounded by entry
//! count, storing owned clones so readers never alias a mutable frame.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::NaiveDate;

use super::frame::MonthlyFrame;

pub type CacheKey = (NaiveDate, NaiveDate, String);

struct Inner {
    entries: HashMap<CacheKey, MonthlyFrame>,
    order: Vec<CacheKey>,
    capacity: usize,
}

/// A small LRU keyed by the engine's calculation parameters. `get` clones the
/// cached frame so concurrent callers never observe a torn write.
pub struct FrameCache {
    inner: Mutex<Inner>,
}

impl FrameCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: Vec::new(),
                capacity: capacity.max(1),
            }),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<MonthlyFrame> {
        let mut guard = self.inner.lock().unwrap();
        let frame = guard.entries.get(key).cloned()?;
        guard.order.retain(|k| k != key);
        guard.order.push(key.clone());
        Some(frame)
    }

    pub fn insert(&self, key: CacheKey, frame: MonthlyFrame) {
        let mut guard = self.inner.lock().unwrap();
        if !guard.entries.contains_key(&key) && guard.entries.len() >= guard.capacity {
            if let Some(oldest) = guard.order.first().cloned() {
                guard.entries.remove(&oldest);
                guard.order.remove(0);
            }
        }
        guard.order.retain(|k| k != &key);
        guard.order.push(key.clone());
        guard.entries.insert(key, frame);
    }

    pub fn clear(&self) {
        let mut guard = self.inner.lock().unwrap();
        guard.entries.clear();
        guard.order.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn evicts_oldest_entry_past_capacity() {
        let cache = FrameCache::new(2);
        let k1 = (date("2024-01-01"), date("2024-12-01"), "baseline".to_string());
        let k2 = (date("2024-01-01"), date("2024-12-01"), "optimistic".to_string());
        let k3 = (date("2024-01-01"), date("2024-12-01"), "conservative".to_string());
        cache.insert(k1.clone(), MonthlyFrame::default());
        cache.insert(k2.clone(), MonthlyFrame::default());
        cache.insert(k3.clone(), MonthlyFrame::default());
        assert!(cache.get(&k1).is_none());
        assert!(cache.get(&k2).is_some());
        assert!(cache.get(&k3).is_some());
    }

    #[test]
    fn clear_then_get_is_a_miss() {
        let cache = FrameCache::new(4);
        let k = (date("2024-01-01"), date("2024-12-01"), "baseline".to_string());
        cache.insert(k.clone(), MonthlyFrame::default());
        cache.clear();
        assert!(cache.get(&k).is_none());
    }
}
