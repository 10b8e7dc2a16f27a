//! Remote lookup functions and the table they are addressed through.
//!
//! A lookup function takes the field's `enumApiParams` and answers with a
//! response shaped `{ "code": 0, "data": [{ "code": ..., "name": ... }] }`.
//! How the call reaches its backend is up to the implementation.

use std::{fmt, future::Future, sync::Arc};

use futures::future::BoxFuture;
use indexmap::IndexMap;
use serde_json::Value;

use crate::module_cache::Nested;

/// A callable remote lookup.
pub trait LookupFn: Send + Sync {
    /// Invoke the lookup with the field's call arguments.
    fn call(&self, params: Value) -> BoxFuture<'static, anyhow::Result<Value>>;
}

impl<F, Fut> LookupFn for F
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    fn call(&self, params: Value) -> BoxFuture<'static, anyhow::Result<Value>> {
        Box::pin(self(params))
    }
}

/// Node of a [`LookupTable`].
#[derive(Clone)]
pub enum LookupNode {
    /// Nested namespace.
    Namespace(IndexMap<String, LookupNode>),
    /// Callable lookup.
    Function(Arc<dyn LookupFn>),
    /// Plain data, not callable.
    Value(Value),
}

impl fmt::Debug for LookupNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupNode::Namespace(map) => f.debug_map().entries(map.iter()).finish(),
            LookupNode::Function(_) => f.write_str("<function>"),
            LookupNode::Value(v) => write!(f, "{v}"),
        }
    }
}

impl Nested for LookupNode {
    fn child(&self, key: &str) -> Option<&Self> {
        match self {
            LookupNode::Namespace(map) => map.get(key),
            _ => None,
        }
    }
}

/// Table of lookup functions addressed by dotted path, e.g. `dict.query`.
#[derive(Debug, Clone)]
pub struct LookupTable {
    root: LookupNode,
}

impl Default for LookupTable {
    fn default() -> Self {
        Self {
            root: LookupNode::Namespace(IndexMap::new()),
        }
    }
}

impl LookupTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Root namespace.
    pub fn root(&self) -> &LookupNode {
        &self.root
    }

    /// Register a function at a dotted path.
    pub fn with_function(mut self, path: &str, func: impl LookupFn + 'static) -> Self {
        self.insert(path, LookupNode::Function(Arc::new(func)));
        self
    }

    /// Register plain data at a dotted path.
    pub fn with_value(mut self, path: &str, value: Value) -> Self {
        self.insert(path, LookupNode::Value(value));
        self
    }

    /// Insert a node, creating namespaces along the way.
    ///
    /// Anything that is not a namespace and sits on the path is replaced.
    pub fn insert(&mut self, path: &str, node: LookupNode) {
        let segments: Vec<&str> = path.split('.').collect();
        insert_at(&mut self.root, &segments, node);
    }
}

fn insert_at(current: &mut LookupNode, segments: &[&str], node: LookupNode) {
    let Some((first, rest)) = segments.split_first() else {
        *current = node;
        return;
    };
    if !matches!(current, LookupNode::Namespace(_)) {
        *current = LookupNode::Namespace(IndexMap::new());
    }
    if let LookupNode::Namespace(map) = current {
        let child = map
            .entry(first.to_string())
            .or_insert_with(|| LookupNode::Namespace(IndexMap::new()));
        insert_at(child, rest, node);
    }
}
