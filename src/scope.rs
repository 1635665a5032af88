// src/scope.rs

//! Layered key/value scope passed down a dataset chain.
//!
//! A scope is a chain of maps: lookups check the innermost layer first, so a
//! child scope shadows its parent on conflicting keys. Wrappers seed a child
//! layer with their own overrides on top of the inner dataset's scope; the
//! store persists the flattened view.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::item::Payload;

#[derive(Debug)]
struct Layer {
    local: BTreeMap<String, Payload>,
    parent: Option<Arc<Layer>>,
}

/// A hierarchical lookup map. Cloning is cheap (layers are shared).
#[derive(Debug, Clone, Default)]
pub struct Scope {
    head: Option<Arc<Layer>>,
}

impl Scope {
    /// An empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// A single-layer scope over the given entries.
    pub fn with(entries: impl IntoIterator<Item = (String, Payload)>) -> Self {
        Self::new().child(entries)
    }

    /// Looks up a key, innermost layer first.
    pub fn get(&self, key: &str) -> Option<&Payload> {
        let mut layer = self.head.as_deref();
        while let Some(l) = layer {
            if let Some(value) = l.local.get(key) {
                return Some(value);
            }
            layer = l.parent.as_deref();
        }
        None
    }

    /// Builds a child scope whose layer shadows this scope.
    pub fn child(&self, overrides: impl IntoIterator<Item = (String, Payload)>) -> Scope {
        Scope {
            head: Some(Arc::new(Layer {
                local: overrides.into_iter().collect(),
                parent: self.head.clone(),
            })),
        }
    }

    pub fn is_empty(&self) -> bool {
        let mut layer = self.head.as_deref();
        while let Some(l) = layer {
            if !l.local.is_empty() {
                return false;
            }
            layer = l.parent.as_deref();
        }
        true
    }

    /// Flattens the chain into a single map, children shadowing parents.
    pub fn flatten(&self) -> BTreeMap<String, Payload> {
        let mut layers = Vec::new();
        let mut layer = self.head.as_deref();
        while let Some(l) = layer {
            layers.push(l);
            layer = l.parent.as_deref();
        }
        let mut out = BTreeMap::new();
        for l in layers.into_iter().rev() {
            for (k, v) in &l.local {
                out.insert(k.clone(), v.clone());
            }
        }
        out
    }
}
