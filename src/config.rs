use crate::error::PresearchError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "wildgram";
const CONFIG_FILE: &str = "config.json";

/// Unit used by the upstream tokenizer for token offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OffsetUnit {
    /// Offsets count Unicode scalar values
    #[default]
    Chars,
    /// Offsets count UTF-8 bytes
    Bytes,
}

/// Scope of the duplicate-collapsing memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DedupWindow {
    /// Remember keys only while tokens share the same source token offset
    #[default]
    Positional,
    /// Remember every key seen in the field stream
    Global,
}

/// Presearcher configuration, shared by the query-side extractor and the
/// document-side n-gram expander.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresearchConfig {
    /// Marker appended to anchor terms and to every generated document suffix
    #[serde(default = "default_suffix_marker")]
    pub suffix_marker: String,

    /// Reserved term under which unnarrowable queries are indexed
    #[serde(default = "default_any_token")]
    pub any_token: String,

    /// First char position (inclusive) at which proper suffixes are taken
    #[serde(default = "default_min_suffix_len")]
    pub min_suffix_len: usize,

    /// Last char position (inclusive) at which proper suffixes are taken.
    /// None means every suffix down to a single char.
    #[serde(default)]
    pub max_suffix_len: Option<usize>,

    /// Tokens longer than this (in chars) are not expanded; the document then
    /// admits every anchored query. None disables the limit.
    #[serde(default)]
    pub max_token_chars: Option<usize>,

    /// Shortest literal run (in chars) worth indexing as an anchor
    #[serde(default = "default_min_anchor_len")]
    pub min_anchor_len: usize,

    /// Lower-case anchors, matching a lower-casing upstream tokenizer
    #[serde(default)]
    pub fold_case: bool,

    /// Fail when the marker shows up inside query literals or document tokens
    #[serde(default = "default_reject_marker_collisions")]
    pub reject_marker_collisions: bool,

    #[serde(default)]
    pub offset_unit: OffsetUnit,

    #[serde(default)]
    pub dedup_window: DedupWindow,
}

fn default_suffix_marker() -> String {
    "XX".to_string()
}

fn default_any_token() -> String {
    "__ANYTOKEN__".to_string()
}

fn default_min_suffix_len() -> usize {
    1
}

fn default_min_anchor_len() -> usize {
    1
}

fn default_reject_marker_collisions() -> bool {
    true
}

impl Default for PresearchConfig {
    fn default() -> Self {
        Self {
            suffix_marker: default_suffix_marker(),
            any_token: default_any_token(),
            min_suffix_len: default_min_suffix_len(),
            max_suffix_len: None,
            max_token_chars: None,
            min_anchor_len: default_min_anchor_len(),
            fold_case: false,
            reject_marker_collisions: default_reject_marker_collisions(),
            offset_unit: OffsetUnit::default(),
            dedup_window: DedupWindow::default(),
        }
    }
}

impl PresearchConfig {
    /// Load config from the app data directory, or return default if not found
    pub fn load() -> Result<Self> {
        let config_path = get_config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load and validate config from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: PresearchConfig = serde_json::from_str(&content)
            .context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the app data directory
    pub fn save(&self) -> Result<()> {
        let config_path = get_config_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .context("Failed to serialize config")?;
        fs::write(path, content)
            .context("Failed to write config file")?;
        Ok(())
    }

    /// Check that the extractor and the expander can agree on this config.
    pub fn validate(&self) -> crate::Result<()> {
        if self.suffix_marker.is_empty() {
            return Err(PresearchError::InvalidConfig(
                "suffix_marker must not be empty".to_string(),
            ));
        }
        if self.min_suffix_len == 0 {
            return Err(PresearchError::InvalidConfig(
                "min_suffix_len must be at least 1 (position 0 is the full token)".to_string(),
            ));
        }
        if let Some(max) = self.max_suffix_len {
            if max < self.min_suffix_len {
                return Err(PresearchError::InvalidConfig(format!(
                    "max_suffix_len {} is below min_suffix_len {}",
                    max, self.min_suffix_len
                )));
            }
        }
        if self.min_anchor_len == 0 {
            return Err(PresearchError::InvalidConfig(
                "min_anchor_len must be at least 1".to_string(),
            ));
        }
        if self.any_token.is_empty() || self.any_token.contains(&self.suffix_marker) {
            return Err(PresearchError::InvalidConfig(format!(
                "any_token {:?} must be non-empty and free of the suffix marker",
                self.any_token
            )));
        }
        Ok(())
    }
}

/// Get the path to the config file
pub fn get_config_path() -> Result<PathBuf> {
    let app_dir = get_app_data_dir()?;
    Ok(app_dir.join(CONFIG_FILE))
}

/// Get the application data directory
pub fn get_app_data_dir() -> Result<PathBuf> {
    let base = if cfg!(target_os = "macos") {
        dirs::home_dir()
            .map(|h| h.join("Library").join("Application Support"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
    } else {
        // Linux/Unix: use XDG_DATA_HOME or ~/.local/share
        dirs::data_dir()
    };

    let base = base.context("Could not determine app data directory")?;
    let app_dir = base.join(APP_NAME);

    fs::create_dir_all(&app_dir)?;
    Ok(app_dir)
}
