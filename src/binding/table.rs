//! Semantic binding table: name → (group, binding, optional block offset).

use rustc_hash::FxHashMap;

use crate::errors::{LoomError, Result};

/// Where a named shader resource lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingEntry {
    pub name: String,
    pub group: u32,
    pub binding: u32,
    /// Byte offset inside a uniform block, `None` for whole-resource bindings.
    pub byte_offset: Option<u32>,
}

impl BindingEntry {
    #[inline]
    #[must_use]
    pub fn is_uniform(&self) -> bool {
        self.byte_offset.is_some()
    }
}

#[derive(Debug, Default)]
pub struct BindingTable {
    entries: FxHashMap<String, BindingEntry>,
}

impl BindingTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `entry`, replacing any previous entry of the same name.
    pub fn define(&mut self, entry: BindingEntry) {
        if let Some(previous) = self.entries.insert(entry.name.clone(), entry) {
            log::debug!("Binding '{}' redeclared", previous.name);
        }
    }

    #[inline]
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&BindingEntry> {
        self.entries.get(name)
    }

    /// Like [`find`](Self::find), failing with `BindingNotDefined`.
    pub fn resolve(&self, name: &str) -> Result<&BindingEntry> {
        self.entries
            .get(name)
            .ok_or_else(|| LoomError::BindingNotDefined(name.to_string()))
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
