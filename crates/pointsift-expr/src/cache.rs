//! Cache of validated expressions keyed by their source text
//!
//! Validation is deterministic, so the same text always yields the
//! same tree and can be compiled once per process.

use crate::error::ExprResult;
use crate::validate::{parse_and_validate_with_limit, ValidatedExpr, DEFAULT_MAX_EXPRESSION_LEN};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::trace;

/// Thread-safe map from expression text to its validated form
///
/// Only successful validations are stored; rejected text is re-checked
/// (and rejected again) on every call.
#[derive(Debug)]
pub struct ExprCache {
    entries: RwLock<HashMap<String, Arc<ValidatedExpr>>>,
    max_len: usize,
}

impl Default for ExprCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ExprCache {
    /// Create an empty cache using the default length limit
    pub fn new() -> Self {
        Self::with_max_len(DEFAULT_MAX_EXPRESSION_LEN)
    }

    /// Create an empty cache that rejects text longer than `max_len` bytes
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_len,
        }
    }

    /// Return the cached expression for `text`, validating it on a miss
    pub fn get_or_compile(&self, text: &str) -> ExprResult<Arc<ValidatedExpr>> {
        {
            // A poisoned lock still holds a consistent map: entries are only
            // ever inserted whole.
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            if let Some(hit) = entries.get(text) {
                trace!(expression = text, "expression cache hit");
                return Ok(Arc::clone(hit));
            }
        }

        let compiled = Arc::new(parse_and_validate_with_limit(text, self.max_len)?);
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let entry = entries.entry(text.to_string()).or_insert(compiled);
        Ok(Arc::clone(entry))
    }

    /// Number of cached expressions
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached expression
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_returns_same_instance() {
        let cache = ExprCache::new();
        let first = cache.get_or_compile("x > 0").unwrap();
        let second = cache.get_or_compile("x > 0").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let cache = ExprCache::new();
        assert!(cache.get_or_compile("x >").is_err());
        assert!(cache.get_or_compile("open('x')").is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear() {
        let cache = ExprCache::new();
        cache.get_or_compile("x > 0").unwrap();
        cache.get_or_compile("y > 0").unwrap();
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_respects_length_limit() {
        let cache = ExprCache::with_max_len(8);
        assert!(cache.get_or_compile("x > 0").is_ok());
        assert!(cache.get_or_compile("x > 0 and y > 0").unwrap_err().is_syntax());
    }

    #[test]
    fn test_shared_across_threads() {
        let cache = Arc::new(ExprCache::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.get_or_compile("abs(x) < 1").unwrap())
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.iter().all(|r| r.root() == results[0].root()));
        assert_eq!(cache.len(), 1);
    }
}
