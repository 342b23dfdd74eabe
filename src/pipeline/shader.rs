//! Shader Sources and Defines
//!
//! Shader preprocessing lives outside this crate. What the pipeline cache
//! needs from a shader is a stable identity, so a [`ShaderSource`] carries
//! the WGSL text, the conditional-compilation [`ShaderDefines`] that apply to
//! it, and an xxh3 hash of both.
//!
//! Defines are owned by each source instance. Two batchers using different
//! define sets never observe each other's values.
//!
//! # Usage
//!
//! ```rust,ignore
//! use loom::pipeline::{ShaderDefines, ShaderSource};
//!
//! let mut defines = ShaderDefines::new();
//! defines.set("USE_TINT", "true");
//! let shader = ShaderSource::new("tinted", TINT_WGSL).with_defines(defines);
//! ```

use std::fmt::Write as _;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use xxhash_rust::xxh3::Xxh3;

/// An ordered set of `NAME = value` shader defines.
///
/// Kept sorted by name so that identical sets compare and hash identically
/// regardless of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ShaderDefines {
    defines: Vec<(String, String)>,
}

impl ShaderDefines {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set shader define (maintains sorted order)
    ///
    /// If key exists, updates its value; otherwise inserts new entry.
    pub fn set(&mut self, key: &str, value: &str) {
        match self.defines.binary_search_by(|(k, _)| k.as_str().cmp(key)) {
            Ok(idx) => value.clone_into(&mut self.defines[idx].1),
            Err(idx) => self.defines.insert(idx, (key.to_owned(), value.to_owned())),
        }
    }

    pub fn remove(&mut self, key: &str) -> bool {
        if let Ok(idx) = self.defines.binary_search_by(|(k, _)| k.as_str().cmp(key)) {
            self.defines.remove(idx);
            true
        } else {
            false
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.defines
            .binary_search_by(|(k, _)| k.as_str().cmp(key))
            .ok()
            .map(|idx| self.defines[idx].1.as_str())
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.defines.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.defines.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.defines.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Renders the defines as WGSL module-scope constants, one per line.
    #[must_use]
    pub fn wgsl_prelude(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.defines {
            let _ = writeln!(out, "const {key} = {value};");
        }
        out
    }
}

impl From<&[(&str, &str)]> for ShaderDefines {
    fn from(defines: &[(&str, &str)]) -> Self {
        let mut result = Self::new();
        for (k, v) in defines {
            result.set(k, v);
        }
        result
    }
}

/// WGSL program text plus its defines, with a precomputed identity hash.
#[derive(Debug, Clone)]
pub struct ShaderSource {
    label: Arc<str>,
    code: Arc<str>,
    defines: ShaderDefines,
    hash: u64,
}

impl ShaderSource {
    #[must_use]
    pub fn new(label: &str, code: &str) -> Self {
        let code: Arc<str> = Arc::from(code);
        let defines = ShaderDefines::new();
        let hash = Self::compute_hash(&code, &defines);
        Self {
            label: Arc::from(label),
            code,
            defines,
            hash,
        }
    }

    #[must_use]
    pub fn with_defines(mut self, defines: ShaderDefines) -> Self {
        self.hash = Self::compute_hash(&self.code, &defines);
        self.defines = defines;
        self
    }

    fn compute_hash(code: &str, defines: &ShaderDefines) -> u64 {
        let mut hasher = Xxh3::new();
        hasher.update(code.as_bytes());
        for (key, value) in defines.iter() {
            hasher.update(&[0]);
            hasher.update(key.as_bytes());
            hasher.update(&[b'=']);
            hasher.update(value.as_bytes());
        }
        hasher.digest()
    }

    #[inline]
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[inline]
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    #[inline]
    #[must_use]
    pub fn defines(&self) -> &ShaderDefines {
        &self.defines
    }

    /// Identity of `(code, defines)`; used as the shader component of
    /// pipeline keys and as the shader module cache key.
    #[inline]
    #[must_use]
    pub fn hash(&self) -> u64 {
        self.hash
    }

    /// The text handed to the shader compiler: define prelude, then code.
    #[must_use]
    pub fn final_source(&self) -> String {
        if self.defines.is_empty() {
            return self.code.to_string();
        }
        let mut out = self.defines.wgsl_prelude();
        out.push_str(&self.code);
        out
    }
}

impl PartialEq for ShaderSource {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.code == other.code && self.defines == other.defines
    }
}

impl Eq for ShaderSource {}

impl Hash for ShaderSource {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defines_order_independent() {
        let mut a = ShaderDefines::new();
        a.set("B", "2");
        a.set("A", "1");
        let b = ShaderDefines::from(&[("A", "1"), ("B", "2")][..]);
        assert_eq!(a, b);
        assert_eq!(a.get("A"), Some("1"));
    }

    #[test]
    fn test_defines_overwrite_and_remove() {
        let mut d = ShaderDefines::new();
        d.set("X", "1");
        d.set("X", "2");
        assert_eq!(d.len(), 1);
        assert_eq!(d.get("X"), Some("2"));
        assert!(d.remove("X"));
        assert!(!d.remove("X"));
        assert!(d.is_empty());
    }

    #[test]
    fn test_shader_hash_tracks_defines() {
        let plain = ShaderSource::new("s", "fn main() {}");
        let same = ShaderSource::new("other label", "fn main() {}");
        assert_eq!(plain.hash(), same.hash());
        assert_eq!(plain, same);

        let defined = plain
            .clone()
            .with_defines(ShaderDefines::from(&[("FLAG", "true")][..]));
        assert_ne!(plain.hash(), defined.hash());
        assert!(defined.final_source().starts_with("const FLAG = true;\n"));
    }
}
