//! Asset closures over a bundler manifest.
//!
//! A bundler manifest maps module keys (project-relative source paths) to the
//! chunk emitted for them. A chunk lists the keys it statically imports, its
//! css files and the keys it may import dynamically.
//!
//! [`BundlerManifest::get_chunks`] walks `imports` depth-first and returns the
//! entry followed by its closure in post-order, so every chunk comes after the
//! chunks it depends on. Each key appears once, even when the import graph has
//! diamonds or cycles.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChunkError {
    #[error("manifest key not found: {0}")]
    KeyNotFound(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One output chunk as described by the bundler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ManifestChunk {
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub css: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub assets: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dynamic_imports: Vec<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_entry: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_dynamic_entry: bool,
}

/// A chunk together with the key it is stored under.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkRef<'a> {
    pub key: &'a str,
    pub chunk: &'a ManifestChunk,
}

/// `{<module key>: chunk}` as written by the bundler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BundlerManifest {
    chunks: BTreeMap<String, ManifestChunk>,
}

struct Frame<'a> {
    key: &'a str,
    chunk: &'a ManifestChunk,
    next: usize,
}

impl BundlerManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self, ChunkError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self, ChunkError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.chunks.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&ManifestChunk> {
        self.chunks.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, chunk: ManifestChunk) {
        self.chunks.insert(key.into(), chunk);
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    fn lookup(&self, key: &str) -> Result<ChunkRef<'_>, ChunkError> {
        self.chunks
            .get_key_value(key)
            .map(|(key, chunk)| ChunkRef { key, chunk })
            .ok_or_else(|| ChunkError::KeyNotFound(key.to_string()))
    }

    /// The entry chunk for `key` followed by its static import closure.
    ///
    /// Children precede their parents. A key that is referenced but absent
    /// from the manifest is an error.
    pub fn get_chunks(&self, key: &str) -> Result<Vec<ChunkRef<'_>>, ChunkError> {
        let entry = self.lookup(key)?;
        let mut seen: HashSet<&str> = HashSet::from([entry.key]);
        let mut closure = vec![entry];
        let mut stack = vec![Frame {
            key: entry.key,
            chunk: entry.chunk,
            next: 0,
        }];

        while let Some(frame) = stack.last_mut() {
            let chunk = frame.chunk;
            let Some(import) = chunk.imports.get(frame.next) else {
                let key = frame.key;
                stack.pop();
                // The entry is already first in the list.
                if !stack.is_empty() {
                    closure.push(ChunkRef { key, chunk });
                }
                continue;
            };
            frame.next += 1;

            if !seen.insert(import.as_str()) {
                continue;
            }
            let importee = self.lookup(import)?;
            stack.push(Frame {
                key: importee.key,
                chunk: importee.chunk,
                next: 0,
            });
        }

        Ok(closure)
    }

    /// Chunks reachable through `dynamicImports` of any chunk in `closure`
    /// that are not already part of it.
    pub fn dynamic_chunks<'a>(
        &'a self,
        closure: &[ChunkRef<'a>],
    ) -> Result<Vec<ChunkRef<'a>>, ChunkError> {
        let mut seen: HashSet<&str> = closure.iter().map(|c| c.key).collect();
        let mut dynamic = Vec::new();
        for chunk in closure {
            for import in &chunk.chunk.dynamic_imports {
                if seen.insert(import.as_str()) {
                    dynamic.push(self.lookup(import)?);
                }
            }
        }
        Ok(dynamic)
    }
}
