//! A shared cache of compiled expressions.
//!
//! Schemas repeat the same `must`/`when` conditions over many nodes, so
//! validating a tree recompiles the same text again and again. The cache
//! keeps the most recently used compilations behind a mutex.

use crate::error::XPathError;
use crate::token::Expr;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(256) {
    Some(capacity) => capacity,
    None => NonZeroUsize::MIN,
};

#[derive(Debug)]
pub struct ExprCache {
    entries: Mutex<LruCache<String, Arc<Expr>>>,
}

impl ExprCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Returns the compiled form of `text`, compiling it on a miss.
    /// Expressions that fail to compile are not cached.
    pub fn get_or_parse(&self, text: &str) -> Result<Arc<Expr>, XPathError> {
        if let Some(expr) = self.lock().get(text) {
            log::trace!("Expression cache hit for '{}'", text);
            return Ok(Arc::clone(expr));
        }
        let expr = Arc::new(Expr::parse(text)?);
        self.lock().put(text.to_string(), Arc::clone(&expr));
        Ok(expr)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    // A panic while holding the lock cannot leave the cache half-updated.
    fn lock(&self) -> MutexGuard<'_, LruCache<String, Arc<Expr>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ExprCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
