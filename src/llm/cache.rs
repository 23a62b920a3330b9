//! Bounded LRU cache mapping system-prompt text to a provider-prepared
//! payload, avoiding repeated validation/allocation for repeated prompts
//! (spec §4.A, "System-prompt cache").

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

const DEFAULT_CAPACITY: usize = 20;

pub struct PromptCache {
    inner: Mutex<LruCache<String, String>>,
}

impl PromptCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity.max(1)).unwrap(),
            )),
        }
    }

    pub fn get(&self, prompt: &str) -> Option<String> {
        self.inner.lock().unwrap().get(prompt).cloned()
    }

    pub fn put(&self, prompt: String, prepared: String) {
        self.inner.lock().unwrap().put(prompt, prepared);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PromptCache {
    fn default() -> Self {
        Self::new()
    }
}
