//! Engine configuration.
//!
//! Loaded from TOML. Every field has a default so an empty file is a valid
//! configuration; `validate` runs after every load.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use credence_core::Address;

use crate::error::{EngineError, EngineResult};

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// 30 days.
fn default_claim_window() -> u64 {
    2_592_000
}

fn default_max_batch_rows() -> usize {
    500
}

fn default_txn_group_size() -> usize {
    16
}

fn default_chunk_pause_ms() -> u64 {
    250
}

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seconds a pending credential stays claimable after issuance.
    #[serde(default = "default_claim_window")]
    pub escrow_claim_window_secs: u64,

    /// Hard cap on data rows accepted per batch upload.
    #[serde(default = "default_max_batch_rows")]
    pub max_batch_rows: usize,

    /// Rows minted per chunk during batch processing.
    #[serde(default = "default_txn_group_size")]
    pub txn_group_size: usize,

    /// Pause between chunks. Zero disables pacing.
    #[serde(default = "default_chunk_pause_ms")]
    pub chunk_pause_ms: u64,

    /// Governance administrator addresses.
    #[serde(default)]
    pub admins: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            escrow_claim_window_secs: default_claim_window(),
            max_batch_rows: default_max_batch_rows(),
            txn_group_size: default_txn_group_size(),
            chunk_pause_ms: default_chunk_pause_ms(),
            admins: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let raw = fs::read_to_string(path.as_ref())
            .map_err(|e| EngineError::Internal(format!("failed to read config: {}", e)))?;
        let config: Self = toml::from_str(&raw)
            .map_err(|e| EngineError::Validation(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Write configuration to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> EngineResult<()> {
        let raw = toml::to_string_pretty(self)
            .map_err(|e| EngineError::Internal(format!("failed to encode config: {}", e)))?;
        fs::write(path.as_ref(), raw)
            .map_err(|e| EngineError::Internal(format!("failed to write config: {}", e)))
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.escrow_claim_window_secs == 0 {
            return Err(EngineError::Validation(
                "escrow_claim_window_secs must be positive".into(),
            ));
        }
        if self.max_batch_rows == 0 {
            return Err(EngineError::Validation(
                "max_batch_rows must be positive".into(),
            ));
        }
        if self.txn_group_size == 0 {
            return Err(EngineError::Validation(
                "txn_group_size must be positive".into(),
            ));
        }
        for admin in &self.admins {
            if !Address::is_valid(admin) {
                return Err(EngineError::Validation(format!(
                    "invalid admin address: {}",
                    admin
                )));
            }
        }
        Ok(())
    }

    /// Admin addresses as validated `Address` values.
    pub fn admin_addresses(&self) -> EngineResult<Vec<Address>> {
        self.admins
            .iter()
            .map(|a| Address::parse(a.as_str()).map_err(EngineError::from))
            .collect()
    }
}
