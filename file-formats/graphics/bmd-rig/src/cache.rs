//! Shared model cache and asset sources
//!
//! Decoding the binary asset format happens outside this crate; an
//! [`AssetSource`] hands over finished [`RiggedModel`]s. The [`ModelCache`]
//! keys them by normalized path and shares each one through `Arc`, which is
//! sound for the whole process lifetime because models are never mutated.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Result, RigError};
use crate::model::RiggedModel;

/// Provider of decoded models
pub trait AssetSource {
    /// Fetch the model stored at `path` (already normalized)
    ///
    /// Fails with [`RigError::AssetMissing`] when nothing is stored there
    /// and [`RigError::Parse`] when the data cannot be decoded.
    fn fetch(&self, path: &str) -> Result<RiggedModel>;
}

/// Normalize an asset path for use as a cache key
///
/// Lowercases, turns `\` into `/`, drops empty and `.` segments and
/// resolves `..` where possible.
pub fn normalize_path(path: &str) -> String {
    let lowered = path.replace('\\', "/").to_lowercase();
    let mut segments: Vec<&str> = Vec::new();
    for segment in lowered.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|s| *s != "..") {
                    segments.pop();
                } else {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// In-memory source, for embedding and tests
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    models: HashMap<String, RiggedModel>,
}

impl MemorySource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a model under `path`
    pub fn insert(&mut self, path: &str, model: RiggedModel) {
        self.models.insert(normalize_path(path), model);
    }

    /// Builder-style [`MemorySource::insert`]
    pub fn with(mut self, path: &str, model: RiggedModel) -> Self {
        self.insert(path, model);
        self
    }
}

impl AssetSource for MemorySource {
    fn fetch(&self, path: &str) -> Result<RiggedModel> {
        self.models
            .get(path)
            .cloned()
            .ok_or_else(|| RigError::AssetMissing(path.to_string()))
    }
}

/// Source reading JSON-serialized models below a root directory
#[cfg(feature = "serde-support")]
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    root: std::path::PathBuf,
}

#[cfg(feature = "serde-support")]
impl JsonFileSource {
    /// Create a source rooted at `root`
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[cfg(feature = "serde-support")]
impl AssetSource for JsonFileSource {
    fn fetch(&self, path: &str) -> Result<RiggedModel> {
        let full = self.root.join(path);
        let text = match std::fs::read_to_string(&full) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RigError::AssetMissing(full.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        RiggedModel::from_json(&text)
    }
}

/// Process-wide cache of shared models
#[derive(Debug)]
pub struct ModelCache<S> {
    source: S,
    entries: HashMap<String, Arc<RiggedModel>>,
}

impl<S: AssetSource> ModelCache<S> {
    /// Create a cache over `source`
    pub fn new(source: S) -> Self {
        Self {
            source,
            entries: HashMap::new(),
        }
    }

    /// Get the model at `path`, fetching it on first use
    ///
    /// Failures are not cached; a later call retries the source.
    pub fn load(&mut self, path: &str) -> Result<Arc<RiggedModel>> {
        let key = normalize_path(path);
        if let Some(model) = self.entries.get(&key) {
            log::debug!("Model cache hit: {key}");
            return Ok(Arc::clone(model));
        }

        let model = self.source.fetch(&key)?;
        for problem in model.validate() {
            log::warn!("{key}: {problem}");
        }
        log::debug!(
            "Loaded model {key}: {} bones, {} actions",
            model.bone_count(),
            model.action_count()
        );

        let model = Arc::new(model);
        self.entries.insert(key, Arc::clone(&model));
        Ok(model)
    }

    /// Check if `path` is cached
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(&normalize_path(path))
    }

    /// Get number of cached models
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop models no instance references any more; returns how many
    pub fn purge_unreferenced(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, model| Arc::strong_count(model) > 1);
        before - self.entries.len()
    }

    /// Get the underlying source
    pub fn source(&self) -> &S {
        &self.source
    }
}
