//! The single process-wide personality-block cache (spec.md §4.8 "Cache
//! semantics"): a `dirty` flag plus the cached string, one lock guarding
//! both (spec.md §5 "PersonalityManager cache: one lock guarding the
//! `dirty` flag and the cached string").

use parking_lot::Mutex;

struct CacheState {
    dirty: bool,
    block: String,
}

pub struct BlockCache {
    state: Mutex<CacheState>,
}

impl Default for BlockCache {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockCache {
    #[must_use]
    pub fn new() -> Self {
        Self { state: Mutex::new(CacheState { dirty: true, block: String::new() }) }
    }

    /// Read the cached block if clean; `None` signals the caller must
    /// rebuild.
    #[must_use]
    pub fn get_if_clean(&self) -> Option<String> {
        let state = self.state.lock();
        if state.dirty {
            None
        } else {
            Some(state.block.clone())
        }
    }

    /// Store a freshly rebuilt block and clear the dirty flag.
    pub fn store(&self, block: String) {
        let mut state = self.state.lock();
        state.block = block;
        state.dirty = false;
    }

    /// Mark the cache dirty; the next read rebuilds (spec.md §4.8 "any
    /// mutation that affects the approved set sets the flag").
    pub fn invalidate(&self) {
        self.state.lock().dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_dirty() {
        let cache = BlockCache::new();
        assert!(cache.get_if_clean().is_none());
    }

    #[test]
    fn store_then_read_is_clean() {
        let cache = BlockCache::new();
        cache.store("hello".to_string());
        assert_eq!(cache.get_if_clean(), Some("hello".to_string()));
    }

    #[test]
    fn invalidate_forces_rebuild() {
        let cache = BlockCache::new();
        cache.store("hello".to_string());
        cache.invalidate();
        assert!(cache.get_if_clean().is_none());
    }
}
