//! Memoized schema and contract documents.
//!
//! Each cache holds at most one entry, keyed by the source reference it was
//! loaded from. A hit only takes a read lock. Loads are serialized by a
//! separate mutex, built off to the side and then published by swapping a
//! single `Arc`, so readers see either the old entry or the new one.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use crate::error::ComplianceError;
use crate::loader::{DefaultFetcher, DocumentFetcher};
use crate::types::{CompiledSchema, ContractDocument};

/// Single-entry publish-on-write cell.
struct Slot<T> {
    current: RwLock<Option<Arc<T>>>,
    load_lock: Mutex<()>,
}

impl<T> Slot<T> {
    fn new() -> Self {
        Self {
            current: RwLock::new(None),
            load_lock: Mutex::new(()),
        }
    }

    fn peek(&self) -> Option<Arc<T>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn publish(&self, value: Option<Arc<T>>) {
        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = value;
    }

    fn lock_loads(&self) -> MutexGuard<'_, ()> {
        self.load_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the current entry if `is_current` accepts it, otherwise run
    /// `load` and publish its result. A failed load leaves the slot empty.
    fn get_or_try_load<E>(
        &self,
        is_current: impl Fn(&T) -> bool,
        load: impl FnOnce() -> Result<T, E>,
    ) -> Result<Arc<T>, E> {
        if let Some(hit) = self.peek().filter(|v| is_current(&**v)) {
            return Ok(hit);
        }

        let _guard = self.lock_loads();
        // Another thread may have loaded it while we waited.
        if let Some(hit) = self.peek().filter(|v| is_current(&**v)) {
            return Ok(hit);
        }

        match load() {
            Ok(value) => {
                let value = Arc::new(value);
                self.publish(Some(Arc::clone(&value)));
                Ok(value)
            }
            Err(e) => {
                self.publish(None);
                Err(e)
            }
        }
    }

    fn clear(&self) {
        let _guard = self.lock_loads();
        self.publish(None);
    }
}

fn load_error(source_ref: &str) -> impl FnOnce(crate::error::LoadError) -> ComplianceError + '_ {
    move |cause| ComplianceError::SchemaLoad {
        source_ref: source_ref.to_string(),
        cause,
    }
}

/// Lazily loads and memoizes one compiled JSON Schema.
pub struct SchemaCache {
    fetcher: Arc<dyn DocumentFetcher>,
    slot: Slot<CompiledSchema>,
}

impl SchemaCache {
    /// Cache backed by [`DefaultFetcher`].
    pub fn new() -> Self {
        Self::with_fetcher(DefaultFetcher)
    }

    pub fn with_fetcher(fetcher: impl DocumentFetcher + 'static) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            slot: Slot::new(),
        }
    }

    /// Compiled schema for `source_ref`, fetching and compiling it on first use.
    ///
    /// The same `source_ref` returns the same `Arc` until [`invalidate`](Self::invalidate)
    /// is called. A different `source_ref` replaces the entry.
    ///
    /// # Errors
    ///
    /// `SchemaLoad` if the document cannot be fetched or parsed,
    /// `ValidationFailure` if it does not compile as a schema.
    pub fn get(&self, source_ref: &str) -> Result<Arc<CompiledSchema>, ComplianceError> {
        self.slot.get_or_try_load(
            |schema| schema.source_ref() == source_ref,
            || {
                tracing::debug!(source = source_ref, "loading JSON schema");
                let document = self.fetcher.fetch(source_ref).map_err(load_error(source_ref))?;
                CompiledSchema::compile(source_ref, document)
            },
        )
    }

    /// Drop the memoized schema; the next `get` re-fetches.
    pub fn invalidate(&self) {
        self.slot.clear();
    }

    /// The memoized schema, if any.
    pub fn cached(&self) -> Option<Arc<CompiledSchema>> {
        self.slot.peek()
    }
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SchemaCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaCache")
            .field("cached", &self.slot.peek().map(|s| s.source_ref().to_string()))
            .finish_non_exhaustive()
    }
}

/// A loaded contract plus schemas derived from it.
pub struct ContractEntry {
    source_ref: String,
    contract: ContractDocument,
    whole_document: Slot<CompiledSchema>,
    inline: RwLock<HashMap<String, Arc<CompiledSchema>>>,
}

impl ContractEntry {
    pub fn source_ref(&self) -> &str {
        &self.source_ref
    }

    pub fn contract(&self) -> &ContractDocument {
        &self.contract
    }

    /// The whole contract document compiled as a JSON Schema, built on first use.
    ///
    /// # Errors
    ///
    /// `ValidationFailure` if the document does not compile.
    pub fn whole_document_schema(&self) -> Result<Arc<CompiledSchema>, ComplianceError> {
        self.whole_document.get_or_try_load(
            |_| true,
            || {
                tracing::debug!(source = %self.source_ref, "compiling contract document as schema");
                CompiledSchema::compile(self.source_ref.as_str(), self.contract.document().clone())
            },
        )
    }

    /// An inline response schema from this contract, compiled once per
    /// distinct fragment text and dropped with the entry.
    ///
    /// # Errors
    ///
    /// `ValidationFailure` if the text is not JSON or does not compile.
    pub fn inline_schema(&self, text: &str) -> Result<Arc<CompiledSchema>, ComplianceError> {
        if let Some(hit) = self
            .inline
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(text)
        {
            return Ok(Arc::clone(hit));
        }

        tracing::debug!(source = %self.source_ref, "compiling inline response schema");
        let document = serde_json::from_str(text).map_err(|e| ComplianceError::ValidationFailure {
            message: e.to_string(),
        })?;
        let compiled = Arc::new(CompiledSchema::compile("inline", document)?);

        let mut inline = self.inline.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(inline.entry(text.to_string()).or_insert(compiled)))
    }
}

impl fmt::Debug for ContractEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractEntry")
            .field("source_ref", &self.source_ref)
            .field("base_path", &self.contract.base_path)
            .finish_non_exhaustive()
    }
}

/// Lazily loads and memoizes one parsed contract document.
pub struct ContractCache {
    fetcher: Arc<dyn DocumentFetcher>,
    slot: Slot<ContractEntry>,
}

impl ContractCache {
    /// Cache backed by [`DefaultFetcher`].
    pub fn new() -> Self {
        Self::with_fetcher(DefaultFetcher)
    }

    pub fn with_fetcher(fetcher: impl DocumentFetcher + 'static) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            slot: Slot::new(),
        }
    }

    /// Parsed contract for `source_ref`, fetching it on first use.
    ///
    /// # Errors
    ///
    /// `SchemaLoad` if the document cannot be fetched or is not a contract.
    pub fn get(&self, source_ref: &str) -> Result<Arc<ContractEntry>, ComplianceError> {
        self.slot.get_or_try_load(
            |entry| entry.source_ref == source_ref,
            || {
                tracing::debug!(source = source_ref, "loading contract document");
                let document = self.fetcher.fetch(source_ref).map_err(load_error(source_ref))?;
                let contract =
                    ContractDocument::from_value(document).map_err(load_error(source_ref))?;
                Ok(ContractEntry {
                    source_ref: source_ref.to_string(),
                    contract,
                    whole_document: Slot::new(),
                    inline: RwLock::new(HashMap::new()),
                })
            },
        )
    }

    /// Drop the contract and everything derived from it.
    pub fn invalidate(&self) {
        self.slot.clear();
    }

    pub fn cached(&self) -> Option<Arc<ContractEntry>> {
        self.slot.peek()
    }
}

impl Default for ContractCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ContractCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractCache")
            .field("cached", &self.slot.peek().map(|e| e.source_ref.clone()))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoadError;
    use serde_json::{json, Value};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves fixed documents and counts fetches.
    #[derive(Clone, Default)]
    struct CountingFetcher {
        fetches: Arc<AtomicUsize>,
    }

    impl CountingFetcher {
        fn count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    impl DocumentFetcher for CountingFetcher {
        fn fetch(&self, source: &str) -> Result<Value, LoadError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            match source {
                "object.json" => Ok(json!({ "type": "object" })),
                "string.json" => Ok(json!({ "type": "string" })),
                "broken.json" => Ok(json!({ "type": 7 })),
                "swagger.json" => Ok(json!({
                    "swagger": "2.0",
                    "paths": { "/a": { "get": { "responses": {} } } }
                })),
                other => Err(LoadError::FileNotFound {
                    path: PathBuf::from(other),
                }),
            }
        }
    }

    #[test]
    fn schema_get_is_memoized() {
        let fetcher = CountingFetcher::default();
        let cache = SchemaCache::with_fetcher(fetcher.clone());

        let first = cache.get("object.json").unwrap();
        let second = cache.get("object.json").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(fetcher.count(), 1);
    }

    #[test]
    fn schema_invalidate_forces_refetch() {
        let fetcher = CountingFetcher::default();
        let cache = SchemaCache::with_fetcher(fetcher.clone());

        let first = cache.get("object.json").unwrap();
        cache.invalidate();
        assert!(cache.cached().is_none());
        let second = cache.get("object.json").unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(fetcher.count(), 2);
    }

    #[test]
    fn schema_source_change_replaces_entry() {
        let fetcher = CountingFetcher::default();
        let cache = SchemaCache::with_fetcher(fetcher.clone());

        cache.get("object.json").unwrap();
        let other = cache.get("string.json").unwrap();
        assert_eq!(other.source_ref(), "string.json");
        assert_eq!(fetcher.count(), 2);
    }

    #[test]
    fn failed_load_is_schema_load_error_and_clears_entry() {
        let fetcher = CountingFetcher::default();
        let cache = SchemaCache::with_fetcher(fetcher.clone());

        cache.get("object.json").unwrap();
        let result = cache.get("missing.json");
        assert!(matches!(
            result,
            Err(ComplianceError::SchemaLoad { ref source_ref, .. }) if source_ref == "missing.json"
        ));
        assert!(cache.cached().is_none());
    }

    #[test]
    fn uncompilable_schema_is_validation_failure() {
        let cache = SchemaCache::with_fetcher(CountingFetcher::default());
        let result = cache.get("broken.json");
        assert!(matches!(
            result,
            Err(ComplianceError::ValidationFailure { .. })
        ));
    }

    #[test]
    fn concurrent_gets_fetch_once() {
        let fetcher = CountingFetcher::default();
        let cache = Arc::new(SchemaCache::with_fetcher(fetcher.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.get("object.json").unwrap())
            })
            .collect();
        let schemas: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(fetcher.count(), 1);
        assert!(schemas.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn contract_get_is_memoized() {
        let fetcher = CountingFetcher::default();
        let cache = ContractCache::with_fetcher(fetcher.clone());

        let first = cache.get("swagger.json").unwrap();
        let second = cache.get("swagger.json").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.contract().routes().count(), 1);
        assert_eq!(fetcher.count(), 1);
    }

    #[test]
    fn contract_rejects_non_contract_documents() {
        let cache = ContractCache::with_fetcher(CountingFetcher::default());
        let result = cache.get("string.json");
        assert!(matches!(
            result,
            Err(ComplianceError::SchemaLoad {
                cause: LoadError::InvalidContract { .. },
                ..
            })
        ));
    }

    #[test]
    fn whole_document_schema_is_memoized_per_entry() {
        let cache = ContractCache::with_fetcher(CountingFetcher::default());
        let entry = cache.get("swagger.json").unwrap();

        let first = entry.whole_document_schema().unwrap();
        let second = entry.whole_document_schema().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        // invalidation drops the entry and its derived schema with it
        cache.invalidate();
        let entry = cache.get("swagger.json").unwrap();
        let third = entry.whole_document_schema().unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[test]
    fn inline_schema_is_compiled_once_per_fragment() {
        let cache = ContractCache::with_fetcher(CountingFetcher::default());
        let entry = cache.get("swagger.json").unwrap();
        let text = r#"{"type": "object", "required": ["name"]}"#;

        let first = entry.inline_schema(text).unwrap();
        let second = entry.inline_schema(text).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let other = entry.inline_schema(r#"{"type": "string"}"#).unwrap();
        assert!(!Arc::ptr_eq(&first, &other));

        cache.invalidate();
        let entry = cache.get("swagger.json").unwrap();
        let third = entry.inline_schema(text).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[test]
    fn malformed_inline_schema_is_validation_failure() {
        let cache = ContractCache::with_fetcher(CountingFetcher::default());
        let entry = cache.get("swagger.json").unwrap();
        assert!(matches!(
            entry.inline_schema("{ nope"),
            Err(ComplianceError::ValidationFailure { .. })
        ));
    }
}
