//! Atomic JSON file persistence shared by the stores.

use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{ChimeError, ChimeResult};

/// Load a store file, treating a missing file as the empty value.
pub fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> ChimeResult<T> {
    if !path.exists() {
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| {
        ChimeError::Store(format!("Corrupt store file {}: {e}", path.display()))
    })
}

/// Write a store file atomically: write to `<path>.tmp`, then rename.
pub fn save(path: &Path, value: &impl Serialize) -> ChimeResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(value)
        .map_err(|e| ChimeError::Serialization(e.to_string()))?;

    let temp = path.with_extension("json.tmp");
    std::fs::write(&temp, content)?;
    std::fs::rename(&temp, path)?;
    Ok(())
}
