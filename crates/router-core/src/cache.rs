//! In-memory, capacity-bounded LRU cache keyed by a 128-bit prompt hash.
//!
//! Used by the task analyzer (C3) to skip pattern evaluation on repeat
//! prompts. Unlike the disk-backed response cache this codebase's lineage
//! otherwise reaches for, the analyzer cache is explicitly in-process and
//! bounded: it holds derived `TaskRequirements`, not provider responses, and
//! must evict under a fixed capacity rather than grow unbounded on disk.

use lru::LruCache;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// A 128-bit hash of a prompt, used as the cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PromptHash(pub u128);

impl PromptHash {
    pub fn of(prompt: &str) -> Self {
        let digest = Sha256::digest(prompt.as_bytes());
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        PromptHash(u128::from_be_bytes(bytes))
    }
}

/// Thread-safe LRU cache mapping prompt hashes to a cached value `V`.
///
/// Mutated under a single mutex (read-mostly workload, contention is
/// acceptable at the cache sizes this is used at — default capacity 1024).
pub struct AnalyzerCache<V> {
    inner: Mutex<LruCache<PromptHash, V>>,
}

impl<V: Clone> AnalyzerCache<V> {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity clamped to >= 1");
        AnalyzerCache {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, prompt: &str) -> Option<V> {
        let key = PromptHash::of(prompt);
        let mut guard = self.inner.lock().expect("analyzer cache mutex poisoned");
        guard.get(&key).cloned()
    }

    pub fn insert(&self, prompt: &str, value: V) {
        let key = PromptHash::of(prompt);
        let mut guard = self.inner.lock().expect("analyzer cache mutex poisoned");
        guard.put(key, value);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("analyzer cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry; called on explicit pattern-file reload.
    pub fn clear(&self) {
        self.inner.lock().expect("analyzer cache mutex poisoned").clear();
    }
}
