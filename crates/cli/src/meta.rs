use anyhow::{Context, Result};
use flash_wick_core::{SymbolMeta, VolumeFamilyProvider};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

const DEFAULT_BASE_ASSET_PRECISION: u32 = 8;

#[derive(Debug, Default, Deserialize)]
struct SymbolEntry {
    #[serde(default)]
    base_asset_precision: Option<u32>,
    #[serde(default)]
    volume_family: Option<String>,
}

/// Symbol reference data loaded from a JSON map of pair to metadata.
/// Unknown pairs fall back to the default precision and no family.
#[derive(Debug, Default)]
pub struct SymbolTable {
    entries: HashMap<String, SymbolEntry>,
}

impl SymbolTable {
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let body = std::fs::read_to_string(path)
            .with_context(|| format!("reading symbol table {}", path.display()))?;
        let entries: HashMap<String, SymbolEntry> = serde_json::from_str(&body)
            .with_context(|| format!("parsing symbol table {}", path.display()))?;
        Ok(Self { entries })
    }
}

impl SymbolMeta for SymbolTable {
    fn base_asset_precision(&self, pair: &str) -> u32 {
        self.entries
            .get(pair)
            .and_then(|entry| entry.base_asset_precision)
            .unwrap_or(DEFAULT_BASE_ASSET_PRECISION)
    }
}

impl VolumeFamilyProvider for SymbolTable {
    fn volume_family(&self, pair: &str) -> Option<String> {
        self.entries
            .get(pair)
            .and_then(|entry| entry.volume_family.clone())
    }
}
