//! JSON state snapshot
//!
//! Approvals, alert history and the miner registry in one file, written
//! atomically (temp file + rename) so a crash mid-write never leaves a
//! truncated state file behind.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::types::{MinerRecord, PoolAlertEvent, PoolApproval};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub approvals: Vec<PoolApproval>,
    #[serde(default)]
    pub alerts: Vec<PoolAlertEvent>,
    #[serde(default)]
    pub miners: Vec<MinerRecord>,
}

impl Snapshot {
    /// Write to JSON file
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize state snapshot")?;

        let temp_path = path.as_ref().with_extension("tmp");
        std::fs::write(&temp_path, &json).context("Failed to write temp file")?;
        std::fs::rename(&temp_path, path.as_ref()).context("Failed to rename temp file")?;

        Ok(())
    }

    /// Read from JSON file
    pub fn read_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read state file: {}", path.as_ref().display()))?;
        let snapshot: Self = serde_json::from_str(&json).context("Failed to parse state snapshot JSON")?;
        Ok(snapshot)
    }

    /// Read the file if it exists, otherwise start empty
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if !path.as_ref().exists() {
            info!("No state file at {} - starting empty", path.as_ref().display());
            return Ok(Self::default());
        }
        Self::read_from_file(path)
    }
}
