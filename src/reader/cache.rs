//! Memoizing row source wrapper

use super::{RowSource, SourceRequest};
use crate::table::Table;
use crate::{Result, StatdashError};
use std::collections::HashMap;
use std::sync::Mutex;

/// Caches tables by request so identical requests hit the inner source once
///
/// Failed fetches are not cached. The cache never evicts; pages reload a
/// bounded set of requests.
pub struct CachedSource<S> {
    inner: S,
    entries: Mutex<HashMap<String, Table>>,
}

impl<S: RowSource> CachedSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Number of cached requests
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

impl<S: RowSource> RowSource for CachedSource<S> {
    fn fetch(&self, request: &SourceRequest) -> Result<Table> {
        let key = request.cache_key()?;
        let poisoned = |_| StatdashError::InternalError("Source cache lock poisoned".to_string());

        if let Some(table) = self.entries.lock().map_err(poisoned)?.get(&key) {
            tracing::debug!(kind = request.kind(), "source cache hit");
            return Ok(table.clone());
        }

        // Inner fetch runs without holding the lock
        let table = self.inner.fetch(request)?;
        self.entries
            .lock()
            .map_err(poisoned)?
            .insert(key, table.clone());
        Ok(table)
    }
}
