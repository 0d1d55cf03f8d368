//! Protocol configuration
//!
//! Stored as pretty JSON. Missing fields fall back to the ledger's values.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::crypto::dksap::{StealthProtocol, STEALTH_DOMAIN_TAG};
use crate::crypto::field::FieldElement;
use crate::crypto::poseidon::HashEngine;
use crate::error::{Result, ShieldError};
use crate::tree::live::DEFAULT_ROOT_HISTORY_SIZE;
use crate::tree::zero_hashes::{DEFAULT_TREE_DEPTH, MAX_TREE_DEPTH, ZERO_HASHES_DEPTH_20};

const CONFIG_DIR: &str = ".shielded";
const CONFIG_FILE: &str = "config.json";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Commitment tree depth
    pub tree_depth: usize,
    /// Number of recent roots a spend may reference
    pub root_history_size: usize,
    /// Checked against the computed empty root at startup
    pub expected_empty_root: Option<FieldElement>,
    /// Domain tag mixed into the stealth scalar derivation
    pub stealth_domain_tag: String,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            tree_depth: DEFAULT_TREE_DEPTH,
            root_history_size: DEFAULT_ROOT_HISTORY_SIZE,
            expected_empty_root: FieldElement::from_be_bytes(&ZERO_HASHES_DEPTH_20[DEFAULT_TREE_DEPTH]).ok(),
            stealth_domain_tag: String::from_utf8_lossy(STEALTH_DOMAIN_TAG).into_owned(),
        }
    }
}

impl ProtocolConfig {
    pub fn validate(&self) -> Result<()> {
        if self.tree_depth == 0 || self.tree_depth > MAX_TREE_DEPTH {
            return Err(ShieldError::Config(format!(
                "tree_depth {} outside 1..={}",
                self.tree_depth, MAX_TREE_DEPTH
            )));
        }
        if self.root_history_size == 0 {
            return Err(ShieldError::Config("root_history_size must be at least 1".into()));
        }
        if self.stealth_domain_tag.is_empty() {
            return Err(ShieldError::Config("stealth_domain_tag must not be empty".into()));
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ShieldError::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| ShieldError::Config(format!("failed to encode config: {}", e)))
    }

    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .map_err(|e| ShieldError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        let config = Self::from_json_str(&json)?;
        debug!(path = %path.display(), tree_depth = config.tree_depth, "loaded config");
        Ok(config)
    }

    /// Load `path` if it exists, otherwise the defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Validate and write, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .map_err(|e| ShieldError::Config(format!("failed to create {}: {}", dir.display(), e)))?;
        }
        fs::write(path, self.to_json_string()?)
            .map_err(|e| ShieldError::Config(format!("failed to write {}: {}", path.display(), e)))?;
        info!(path = %path.display(), "saved config");
        Ok(())
    }

    /// `~/.shielded/config.json`
    pub fn default_path() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(CONFIG_DIR).join(CONFIG_FILE))
            .ok_or_else(|| ShieldError::Config("could not find home directory".into()))
    }

    /// Stealth protocol using the configured domain tag
    pub fn stealth_protocol(&self, engine: Arc<HashEngine>) -> StealthProtocol {
        StealthProtocol::with_domain_tag(engine, self.stealth_domain_tag.as_bytes())
    }
}
