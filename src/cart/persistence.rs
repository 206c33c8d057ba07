use super::CartError;
use crate::models::CartSnapshot;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Local key-value slot the cart is serialized into between sessions.
pub trait CartPersistence: Send + Sync {
    fn load(&self) -> Result<Option<CartSnapshot>, CartError>;
    fn save(&self, snapshot: &CartSnapshot) -> Result<(), CartError>;
}

/// Holds the serialized cart in memory, the way a browser storage slot would.
#[derive(Debug, Default)]
pub struct InMemoryCartPersistence {
    slot: Mutex<Option<String>>,
}

impl InMemoryCartPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populates the slot with raw text, corrupt or not.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(raw.into())),
        }
    }

    pub fn raw(&self) -> Option<String> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }
}

impl CartPersistence for InMemoryCartPersistence {
    fn load(&self) -> Result<Option<CartSnapshot>, CartError> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| CartError::Storage("cart slot lock poisoned".to_string()))?;
        match slot.as_deref() {
            Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
            None => Ok(None),
        }
    }

    fn save(&self, snapshot: &CartSnapshot) -> Result<(), CartError> {
        let raw = serde_json::to_string(snapshot)?;
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| CartError::Storage("cart slot lock poisoned".to_string()))?;
        *slot = Some(raw);
        Ok(())
    }
}

/// One JSON file per session.
#[derive(Debug, Clone)]
pub struct JsonFileCartPersistence {
    path: PathBuf,
}

impl JsonFileCartPersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CartPersistence for JsonFileCartPersistence {
    fn load(&self) -> Result<Option<CartSnapshot>, CartError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)
            .map_err(|e| CartError::Storage(format!("{}: {}", self.path.display(), e)))?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn save(&self, snapshot: &CartSnapshot) -> Result<(), CartError> {
        let raw = serde_json::to_vec_pretty(snapshot)?;
        // write-then-rename so a crash never leaves a half-written cart
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw)
            .and_then(|_| fs::rename(&tmp, &self.path))
            .map_err(|e| CartError::Storage(format!("{}: {}", self.path.display(), e)))
    }
}
