//! LRU cache of window tables.
//!
//! A window table is a pure function of (type, size, parameter), so one
//! generated table is shared by every processor that asks for the same key.

use crate::window::{generate_window, WindowType};
use lru::LruCache;
use parking_lot::Mutex;
use sonus_core::Result;
use std::num::NonZeroUsize;
use std::sync::{Arc, OnceLock};

/// Capacity of the process-wide cache.
const SHARED_CACHE_ENTRIES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct WindowKey {
    name: &'static str,
    size: usize,
    parameter_bits: u32,
}

impl WindowKey {
    fn new(window: WindowType, size: usize) -> Self {
        Self {
            name: window.name(),
            size,
            parameter_bits: window.parameter().to_bits(),
        }
    }
}

pub struct WindowCache {
    tables: LruCache<WindowKey, Arc<[f32]>>,
}

impl WindowCache {
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            tables: LruCache::new(capacity),
        }
    }

    /// Return the cached table for `(window, size)`, generating it on a miss.
    pub fn get_or_generate(&mut self, window: WindowType, size: usize) -> Result<Arc<[f32]>> {
        let key = WindowKey::new(window, size);
        if let Some(table) = self.tables.get(&key) {
            return Ok(Arc::clone(table));
        }

        let table: Arc<[f32]> = generate_window(window, size)?.into();
        tracing::trace!(window = window.name(), size, "generated window table");
        self.tables.put(key, Arc::clone(&table));
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn clear(&mut self) {
        self.tables.clear();
    }
}

impl Default for WindowCache {
    fn default() -> Self {
        Self::new(SHARED_CACHE_ENTRIES)
    }
}

fn shared_cache() -> &'static Mutex<WindowCache> {
    static CACHE: OnceLock<Mutex<WindowCache>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(WindowCache::default()))
}

/// Window table from the process-wide cache.
pub fn shared_window(window: WindowType, size: usize) -> Result<Arc<[f32]>> {
    shared_cache().lock().get_or_generate(window, size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_hit_shares_table() {
        let mut cache = WindowCache::new(4);
        let a = cache.get_or_generate(WindowType::Hann, 512).unwrap();
        let b = cache.get_or_generate(WindowType::Hann, 512).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_parameters_are_part_of_key() {
        let mut cache = WindowCache::new(4);
        let a = cache
            .get_or_generate(WindowType::Kaiser { beta: 4.0 }, 64)
            .unwrap();
        let b = cache
            .get_or_generate(WindowType::Kaiser { beta: 9.0 }, 64)
            .unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_eviction() {
        let mut cache = WindowCache::new(2);
        cache.get_or_generate(WindowType::Hann, 8).unwrap();
        cache.get_or_generate(WindowType::Hann, 16).unwrap();
        cache.get_or_generate(WindowType::Hann, 32).unwrap();
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_errors_are_not_cached() {
        let mut cache = WindowCache::new(2);
        assert!(cache.get_or_generate(WindowType::Hann, 0).is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_shared_window() {
        let a = shared_window(WindowType::Blackman, 128).unwrap();
        let b = shared_window(WindowType::Blackman, 128).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
