//! Draft persistence
//!
//! The raw form text (token address, recipients, amounts) survives reloads
//! through a string-valued key-value store. A [`DraftSession`] reads the store
//! once when it is restored and writes each field back whenever it changes.

use crate::normalize::{normalize, NormalizedInput};
use crate::{Error, Result};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Store key for the token address
pub const TOKEN_ADDRESS_KEY: &str = "tokenAddress";

/// Store key for the raw recipients text
pub const RECIPIENTS_KEY: &str = "recipients";

/// Store key for the raw amounts text
pub const AMOUNTS_KEY: &str = "amounts";

/// Raw form contents
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DraftInput {
    pub token_address: String,
    pub recipients: String,
    pub amounts: String,
}

/// String-valued key-value store; last write wins
pub trait DraftStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryDraftStore {
    values: DashMap<String, String>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DraftStore for MemoryDraftStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).map(|value| value.clone()))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Store backed by a single JSON object on disk
#[derive(Debug)]
pub struct JsonFileDraftStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl JsonFileDraftStore {
    /// Open the store at `path`, starting empty if the file does not exist
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = match std::fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| {
                Error::Storage(format!("Failed to parse {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(Error::Storage(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        debug!("Opened draft store at {}", path.display());
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    /// Backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, values: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::Storage(format!("Failed to create {}: {}", parent.display(), e))
                })?;
            }
        }
        let contents = serde_json::to_string_pretty(values)
            .map_err(|e| Error::Storage(format!("Failed to encode draft: {}", e)))?;
        std::fs::write(&self.path, contents)
            .map_err(|e| Error::Storage(format!("Failed to write {}: {}", self.path.display(), e)))
    }
}

impl DraftStore for JsonFileDraftStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self
            .values
            .lock()
            .map_err(|_| Error::Storage("draft store lock poisoned".to_string()))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| Error::Storage("draft store lock poisoned".to_string()))?;
        values.insert(key.to_string(), value.to_string());
        self.flush(&values)
    }
}

/// Form session bound to a draft store
pub struct DraftSession<S: DraftStore> {
    store: S,
    draft: DraftInput,
}

impl<S: DraftStore> DraftSession<S> {
    /// Restore any saved draft from `store`
    pub fn restore(store: S) -> Result<Self> {
        let draft = DraftInput {
            token_address: store.get(TOKEN_ADDRESS_KEY)?.unwrap_or_default(),
            recipients: store.get(RECIPIENTS_KEY)?.unwrap_or_default(),
            amounts: store.get(AMOUNTS_KEY)?.unwrap_or_default(),
        };
        if draft != DraftInput::default() {
            debug!("Restored saved draft");
        }
        Ok(Self { store, draft })
    }

    /// Current form contents
    pub fn draft(&self) -> &DraftInput {
        &self.draft
    }

    /// Underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    fn update(store: &S, key: &str, field: &mut String, value: &str) -> Result<bool> {
        if field == value {
            return Ok(false);
        }
        store.set(key, value).map_err(|e| {
            warn!("Failed to persist draft field {}: {}", key, e);
            e
        })?;
        *field = value.to_string();
        Ok(true)
    }

    /// Set the token address; returns whether it changed
    pub fn set_token_address(&mut self, value: &str) -> Result<bool> {
        Self::update(&self.store, TOKEN_ADDRESS_KEY, &mut self.draft.token_address, value)
    }

    /// Set the raw recipients text; returns whether it changed
    pub fn set_recipients(&mut self, value: &str) -> Result<bool> {
        Self::update(&self.store, RECIPIENTS_KEY, &mut self.draft.recipients, value)
    }

    /// Set the raw amounts text; returns whether it changed
    pub fn set_amounts(&mut self, value: &str) -> Result<bool> {
        Self::update(&self.store, AMOUNTS_KEY, &mut self.draft.amounts, value)
    }

    /// Recompute the normalized lists and total
    pub fn normalized(&self) -> Result<NormalizedInput> {
        normalize(&self.draft.recipients, &self.draft.amounts)
    }
}
