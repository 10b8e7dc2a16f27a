//! Lazily loaded, process-lifetime cache of support tables.
//!
//! Two tables back the dynamic option sources: the dictionary table
//! (`enumDict`) and the lookup-function table (`enumApi`). Each table has an
//! ordered list of load strategies ([`TableSource`]). On first demand the
//! strategies are tried in order; the first success is cached until
//! [`ModuleCache::reset`], and when every strategy fails all failures are
//! reported together.
//!
//! Concurrent first-time requests for the same table share one in-flight
//! load.

use std::{
    fmt,
    future::Future,
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
};

use futures::{
    FutureExt,
    future::{BoxFuture, Shared},
};
use serde_json::Value;

use crate::{
    config::load_document,
    error::{ModuleError, StrategyFailure},
    lookup::LookupTable,
};

/// Identifies one of the support tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableId {
    /// Table of remote lookup functions.
    Lookup,
    /// Table of dictionaries.
    Dictionary,
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableId::Lookup => f.write_str("lookup-function"),
            TableId::Dictionary => f.write_str("dictionary"),
        }
    }
}

/// One strategy for obtaining a support table.
pub trait TableSource<T>: Send + Sync {
    /// Name used in logs and error reports.
    fn name(&self) -> &str;

    /// Load the table.
    fn load(&self) -> BoxFuture<'_, anyhow::Result<T>>;
}

/// Serves a table that is already in memory.
pub struct StaticSource<T> {
    name: String,
    table: T,
}

impl<T> StaticSource<T> {
    pub fn new(name: impl Into<String>, table: T) -> Self {
        Self {
            name: name.into(),
            table,
        }
    }
}

impl<T: Clone + Send + Sync> TableSource<T> for StaticSource<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> BoxFuture<'_, anyhow::Result<T>> {
        let table = self.table.clone();
        Box::pin(async move { Ok(table) })
    }
}

/// Reads a dictionary table from a JSON or TOML file.
pub struct JsonFileSource {
    name: String,
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: format!("file:{}", path.display()),
            path,
        }
    }
}

impl TableSource<Value> for JsonFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> BoxFuture<'_, anyhow::Result<Value>> {
        Box::pin(async move { Ok(load_document(&self.path).await?) })
    }
}

/// Loads a table by calling an async closure.
pub struct FnSource<F> {
    name: String,
    load: F,
}

impl<F> FnSource<F> {
    pub fn new(name: impl Into<String>, load: F) -> Self {
        Self {
            name: name.into(),
            load,
        }
    }
}

impl<T, F, Fut> TableSource<T> for FnSource<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> BoxFuture<'_, anyhow::Result<T>> {
        Box::pin((self.load)())
    }
}

type LoadResult<T> = Result<Arc<T>, Arc<ModuleError>>;
type LoadFuture<T> = Shared<BoxFuture<'static, LoadResult<T>>>;

enum SlotState<T> {
    Empty,
    Loading(LoadFuture<T>),
    Ready(Arc<T>),
}

struct TableSlot<T> {
    id: TableId,
    sources: Vec<Arc<dyn TableSource<T>>>,
    state: Mutex<SlotState<T>>,
}

impl<T: Send + Sync + 'static> TableSlot<T> {
    fn new(id: TableId) -> Self {
        Self {
            id,
            sources: Vec::new(),
            state: Mutex::new(SlotState::Empty),
        }
    }

    async fn resolve(&self) -> LoadResult<T> {
        let pending = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            let pending = match &*state {
                SlotState::Ready(table) => return Ok(table.clone()),
                SlotState::Loading(pending) => pending.clone(),
                SlotState::Empty => load_first(self.id, self.sources.clone()).boxed().shared(),
            };
            *state = SlotState::Loading(pending.clone());
            pending
        };

        let result = pending.clone().await;

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        // A reset during the load leaves the slot alone.
        if let SlotState::Loading(current) = &*state
            && current.ptr_eq(&pending)
        {
            *state = match &result {
                Ok(table) => SlotState::Ready(table.clone()),
                Err(_) => SlotState::Empty,
            };
        }
        result
    }

    fn is_loaded(&self) -> bool {
        matches!(
            &*self.state.lock().unwrap_or_else(PoisonError::into_inner),
            SlotState::Ready(_)
        )
    }

    fn reset(&self) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = SlotState::Empty;
    }
}

async fn load_first<T: Send + Sync + 'static>(
    id: TableId,
    sources: Vec<Arc<dyn TableSource<T>>>,
) -> LoadResult<T> {
    if sources.is_empty() {
        error!("no load strategy registered for the {id} table");
        return Err(Arc::new(ModuleError::NoSources(id)));
    }

    let mut failures = Vec::new();
    for (i, source) in sources.iter().enumerate() {
        match source.load().await {
            Ok(table) => {
                info!("{id} table loaded by `{}` (strategy {})", source.name(), i + 1);
                return Ok(Arc::new(table));
            }
            Err(e) => {
                warn!("{id} table: strategy `{}` failed: {e:#}", source.name());
                failures.push(StrategyFailure {
                    strategy: source.name().to_string(),
                    error: e,
                });
            }
        }
    }

    let err = ModuleError::Unavailable { table: id, failures };
    error!("{err}");
    Err(Arc::new(err))
}

/// Cache of the dictionary and lookup-function tables.
///
/// Build one per process (or per test) and share it behind an [`Arc`].
pub struct ModuleCache {
    lookups: TableSlot<LookupTable>,
    dictionaries: TableSlot<Value>,
}

impl Default for ModuleCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleCache {
    /// Cache without any load strategy.
    pub fn new() -> Self {
        Self {
            lookups: TableSlot::new(TableId::Lookup),
            dictionaries: TableSlot::new(TableId::Dictionary),
        }
    }

    /// Append a strategy for the lookup-function table.
    pub fn with_lookup_source(mut self, source: impl TableSource<LookupTable> + 'static) -> Self {
        self.lookups.sources.push(Arc::new(source));
        self
    }

    /// Append a strategy for the dictionary table.
    pub fn with_dictionary_source(mut self, source: impl TableSource<Value> + 'static) -> Self {
        self.dictionaries.sources.push(Arc::new(source));
        self
    }

    /// The lookup-function table, loading it on first use.
    pub async fn lookups(&self) -> Result<Arc<LookupTable>, Arc<ModuleError>> {
        self.lookups.resolve().await
    }

    /// The dictionary table, loading it on first use.
    pub async fn dictionaries(&self) -> Result<Arc<Value>, Arc<ModuleError>> {
        self.dictionaries.resolve().await
    }

    /// Whether a table has been loaded and cached.
    pub fn is_loaded(&self, id: TableId) -> bool {
        match id {
            TableId::Lookup => self.lookups.is_loaded(),
            TableId::Dictionary => self.dictionaries.is_loaded(),
        }
    }

    /// Drop every cached table; the next request loads again.
    pub fn reset(&self) {
        self.lookups.reset();
        self.dictionaries.reset();
        info!("module cache cleared");
    }
}

/// Tree-shaped data that can be walked one key at a time.
pub trait Nested {
    /// Child stored under `key`, if any.
    fn child(&self, key: &str) -> Option<&Self>;
}

impl Nested for Value {
    fn child(&self, key: &str) -> Option<&Self> {
        match self {
            Value::Object(map) => map.get(key),
            Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }
}

/// Resolve a dot-separated path of keys.
///
/// Returns `None` when the root is absent, the path is empty, or any segment
/// is missing.
pub fn get_nested_value<'a, T: Nested>(root: Option<&'a T>, path: &str) -> Option<&'a T> {
    let root = root?;
    if path.is_empty() {
        return None;
    }
    path.split('.').try_fold(root, |node, key| node.child(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::anyhow;
    use serde_json::json;

    fn failing(name: &str) -> FnSource<impl Fn() -> futures::future::Ready<anyhow::Result<Value>>> {
        let msg = format!("{name} not found");
        FnSource::new(name, move || futures::future::ready(Err(anyhow!(msg.clone()))))
    }

    #[test]
    fn test_get_nested_value() {
        let table = json!({ "a": { "b": { "c": 1 } }, "list": [10, 20], "n": null });

        assert_eq!(get_nested_value(Some(&table), "a.b.c"), Some(&json!(1)));
        assert_eq!(get_nested_value(Some(&table), "list.1"), Some(&json!(20)));
        assert_eq!(get_nested_value(Some(&table), "a.x.c"), None);
        assert_eq!(get_nested_value(Some(&table), "n.x"), None);
        assert_eq!(get_nested_value(Some(&table), ""), None);
        assert_eq!(get_nested_value::<Value>(None, "a"), None);
    }

    #[tokio::test]
    async fn test_first_success_wins_and_is_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let cache = ModuleCache::new()
            .with_dictionary_source(failing("relative"))
            .with_dictionary_source(FnSource::new("dynamic", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, anyhow::Error>(json!({ "sexDict": [] })) }
            }))
            .with_dictionary_source(StaticSource::new("alias", json!({ "unused": true })));

        assert!(!cache.is_loaded(TableId::Dictionary));
        let first = cache.dictionaries().await.unwrap();
        let second = cache.dictionaries().await.unwrap();

        assert!(first.get("sexDict").is_some());
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.is_loaded(TableId::Dictionary));
        assert!(!cache.is_loaded(TableId::Lookup));
    }

    #[tokio::test]
    async fn test_all_failures_reported() {
        let cache = ModuleCache::new()
            .with_lookup_source(FnSource::new("relative", || async {
                Err::<LookupTable, _>(anyhow!("relative import failed"))
            }))
            .with_lookup_source(FnSource::new("require", || async {
                Err::<LookupTable, _>(anyhow!("require failed"))
            }))
            .with_lookup_source(FnSource::new("alias", || async {
                Err::<LookupTable, _>(anyhow!("alias import failed"))
            }));

        let err = cache.lookups().await.unwrap_err();
        match &*err {
            ModuleError::Unavailable { table, failures } => {
                assert_eq!(*table, TableId::Lookup);
                let names: Vec<_> = failures.iter().map(|f| f.strategy.as_str()).collect();
                assert_eq!(names, ["relative", "require", "alias"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("require failed"));
        assert!(!cache.is_loaded(TableId::Lookup));
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let cache = ModuleCache::new().with_dictionary_source(FnSource::new("flaky", move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(anyhow!("not yet"))
                } else {
                    Ok(json!({ "ok": true }))
                }
            }
        }));

        assert!(cache.dictionaries().await.is_err());
        assert_eq!(*cache.dictionaries().await.unwrap(), json!({ "ok": true }));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_no_sources() {
        let cache = ModuleCache::new();
        let err = cache.dictionaries().await.unwrap_err();
        assert!(matches!(*err, ModuleError::NoSources(TableId::Dictionary)));
    }

    #[tokio::test]
    async fn test_concurrent_loads_are_coalesced() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let cache = ModuleCache::new().with_dictionary_source(FnSource::new("slow", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async {
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                Ok::<_, anyhow::Error>(json!({ "sexDict": [] }))
            }
        }));

        let results =
            futures::future::join_all((0..8).map(|_| cache.dictionaries())).await;

        assert!(results.iter().all(Result::is_ok));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reset_forces_reload() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let cache = ModuleCache::new().with_dictionary_source(FnSource::new("count", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, anyhow::Error>(json!({})) }
        }));

        cache.dictionaries().await.unwrap();
        cache.reset();
        assert!(!cache.is_loaded(TableId::Dictionary));
        cache.dictionaries().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_file_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dict.json");
        std::fs::write(&path, r#"{ "sexDict": [{ "code": "1", "name": "男" }] }"#).unwrap();

        let cache = ModuleCache::new()
            .with_dictionary_source(JsonFileSource::new(dir.path().join("missing.json")))
            .with_dictionary_source(JsonFileSource::new(&path));
        let table = cache.dictionaries().await.unwrap();
        assert_eq!(table["sexDict"][0]["name"], "男");
    }
}
