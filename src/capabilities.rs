//! Static capability table
//!
//! A provider implementation can back [`ModelCapabilities`] with this table
//! instead of writing predicates by hand. Model ids resolve to the entry with
//! the longest matching prefix (so `gpt-4o-2024-08-06` picks up `gpt-4o`);
//! resolutions are cached in an LRU.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

use crate::traits::ModelCapabilities;
use crate::types::Pricing;

const DEFAULT_CACHE_ENTRIES: usize = 128;

/// What one model (or model family) supports.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelInfo {
    pub vision: bool,
    pub tools: bool,
    pub structured_output: bool,
    pub reasoning: bool,
    pub context_window: Option<u32>,
    pub pricing: Option<Pricing>,
}

impl ModelInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vision(mut self) -> Self {
        self.vision = true;
        self
    }

    pub fn with_tools(mut self) -> Self {
        self.tools = true;
        self
    }

    pub fn with_structured_output(mut self) -> Self {
        self.structured_output = true;
        self
    }

    pub fn with_reasoning(mut self) -> Self {
        self.reasoning = true;
        self
    }

    pub fn with_context_window(mut self, tokens: u32) -> Self {
        self.context_window = Some(tokens);
        self
    }

    pub fn with_pricing(mut self, pricing: Pricing) -> Self {
        self.pricing = Some(pricing);
        self
    }

    /// Everything on; for tests and permissive providers.
    pub fn all() -> Self {
        Self::new()
            .with_vision()
            .with_tools()
            .with_structured_output()
            .with_reasoning()
    }
}

#[derive(Debug)]
pub struct StaticCapabilities {
    entries: Vec<(String, ModelInfo)>,
    fallback: ModelInfo,
    cache: Mutex<LruCache<String, Option<usize>>>,
}

impl Default for StaticCapabilities {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticCapabilities {
    /// Empty table; unknown models support nothing.
    pub fn new() -> Self {
        Self::with_cache_capacity(DEFAULT_CACHE_ENTRIES)
    }

    pub fn with_cache_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Vec::new(),
            fallback: ModelInfo::default(),
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Add an entry keyed by model id prefix.
    pub fn with_model(mut self, prefix: impl Into<String>, info: ModelInfo) -> Self {
        self.entries.push((prefix.into(), info));
        self.clear_cache();
        self
    }

    /// Info used for models that match no entry.
    pub fn with_fallback(mut self, info: ModelInfo) -> Self {
        self.fallback = info;
        self.clear_cache();
        self
    }

    fn clear_cache(&self) {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    pub fn lookup(&self, model: &str) -> &ModelInfo {
        let mut cache = self
            .cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let index = match cache.get(model) {
            Some(index) => *index,
            None => {
                let index = self
                    .entries
                    .iter()
                    .enumerate()
                    .filter(|(_, (prefix, _))| model.starts_with(prefix.as_str()))
                    .max_by_key(|(_, (prefix, _))| prefix.len())
                    .map(|(i, _)| i);
                cache.put(model.to_string(), index);
                index
            }
        };
        match index {
            Some(i) => &self.entries[i].1,
            None => &self.fallback,
        }
    }

    pub fn is_known(&self, model: &str) -> bool {
        !std::ptr::eq(self.lookup(model), &self.fallback)
    }
}

impl ModelCapabilities for StaticCapabilities {
    fn supports_vision(&self, model: &str) -> bool {
        self.lookup(model).vision
    }

    fn supports_tools(&self, model: &str) -> bool {
        self.lookup(model).tools
    }

    fn supports_structured_output(&self, model: &str) -> bool {
        self.lookup(model).structured_output
    }

    fn supports_reasoning(&self, model: &str) -> bool {
        self.lookup(model).reasoning
    }

    fn context_window(&self, model: &str) -> Option<u32> {
        self.lookup(model).context_window
    }

    fn pricing(&self, model: &str) -> Option<Pricing> {
        self.lookup(model).pricing
    }
}
