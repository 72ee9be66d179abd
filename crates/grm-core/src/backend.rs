use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use thiserror::Error;

/// Raw file content: section header text mapped to its `entry -> value` pairs.
pub type RawSections = BTreeMap<String, BTreeMap<String, String>>;

/// Errors produced by the configuration store and its backends.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The config file exists but could not be read.
    #[error("could not read config file '{path}': {reason}")]
    Read { path: String, reason: String },
    /// The config file exists but is not in the expected format.
    #[error("could not parse config file '{path}' at line {line}: {reason}")]
    Parse {
        path: String,
        line: usize,
        reason: String,
    },
    /// The config file or its directory could not be created or written.
    #[error("could not write config file '{path}': {reason}")]
    Write { path: String, reason: String },
    /// A specifier was supplied for a key that has no per-specifier values.
    #[error("key `{key}` does not accept a specifier")]
    NotOverloadable { key: &'static str },
    /// A name, specifier or value cannot be represented in the config file.
    #[error("invalid {what} '{value}': {reason}")]
    InvalidInput {
        what: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Persistence contract for the configuration store.
///
/// `load` returns `Ok(None)` when nothing has been persisted yet; any other
/// failure is an error the caller must not paper over.
pub trait ConfigBackend {
    fn load(&self) -> Result<Option<RawSections>, StoreError>;

    /// Replace the persisted content with `sections`.
    fn save(&self, sections: &RawSections) -> Result<(), StoreError>;
}

/// Backend keeping content in memory; clones share state. Used by tests and dry runs.
#[derive(Debug, Default, Clone)]
pub struct InMemoryBackend {
    inner: Arc<Mutex<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    sections: Option<RawSections>,
    writes: usize,
    fail_writes: bool,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from already persisted content.
    pub fn with_sections(sections: RawSections) -> Self {
        let backend = Self::default();
        backend.lock().sections = Some(sections);
        backend
    }

    /// Number of successful `save` calls so far.
    pub fn writes(&self) -> usize {
        self.lock().writes
    }

    /// Last persisted content.
    pub fn snapshot(&self) -> Option<RawSections> {
        self.lock().sections.clone()
    }

    /// Make every following `save` fail.
    pub fn fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ConfigBackend for InMemoryBackend {
    fn load(&self) -> Result<Option<RawSections>, StoreError> {
        Ok(self.lock().sections.clone())
    }

    fn save(&self, sections: &RawSections) -> Result<(), StoreError> {
        let mut state = self.lock();
        if state.fail_writes {
            return Err(StoreError::Write {
                path: "<memory>".to_string(),
                reason: "writes disabled".to_string(),
            });
        }
        state.sections = Some(sections.clone());
        state.writes += 1;
        Ok(())
    }
}
