//! Cache of finished runs keyed by the content of their inputs.
//!
//! There is no time-based expiry: an entry is valid exactly as long as the
//! bytes and configuration that produced it, and [`RunCache::invalidate`]
//! drops everything on demand.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::pipeline::{PipelineInput, RunOutput};

/// SHA-256 over the configuration and every input label and byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(input: &PipelineInput, config: &PipelineConfig) -> Result<Self> {
        let mut hasher = Sha256::new();
        update_field(&mut hasher, &serde_json::to_vec(config)?);

        for source in &input.transactions {
            update_field(&mut hasher, b"transaction");
            update_field(&mut hasher, source.name.as_bytes());
            update_field(&mut hasher, &source.bytes);
        }
        for reference in &input.references {
            update_field(&mut hasher, b"reference");
            update_field(&mut hasher, reference.category.label().as_bytes());
            update_field(&mut hasher, reference.source.name.as_bytes());
            update_field(&mut hasher, &reference.source.bytes);
        }
        if let Some(source) = &input.city_coverage {
            update_field(&mut hasher, b"coverage");
            update_field(&mut hasher, source.name.as_bytes());
            update_field(&mut hasher, &source.bytes);
        }

        Ok(Self(format!("{:x}", hasher.finalize())))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Length prefix keeps ("ab", "c") and ("a", "bc") apart.
fn update_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

/// Storage for finished runs.
pub trait RunCache {
    fn get(&self, key: &Fingerprint) -> Option<Arc<RunOutput>>;
    fn put(&mut self, key: Fingerprint, output: Arc<RunOutput>);
    /// Drops every cached run.
    fn invalidate(&mut self);
}

/// Process-local [`RunCache`].
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: HashMap<Fingerprint, Arc<RunOutput>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl RunCache for MemoryCache {
    fn get(&self, key: &Fingerprint) -> Option<Arc<RunOutput>> {
        self.entries.get(key).cloned()
    }

    fn put(&mut self, key: Fingerprint, output: Arc<RunOutput>) {
        self.entries.insert(key, output);
    }

    fn invalidate(&mut self) {
        self.entries.clear();
    }
}
