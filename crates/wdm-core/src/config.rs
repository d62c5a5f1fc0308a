use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Global configuration loaded from `~/.config/wdm/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WdmConfig {
    /// Rename template for single-resource save names.
    pub single_rename: String,
    /// Rename template for archive entry names in sequence downloads.
    pub sequence_rename: String,
    /// Default directory for completed artifacts (None = the embedding
    /// shell decides per job).
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
    /// Override for the worker executable; when unset the two candidate
    /// locations next to the host executable are tried.
    #[serde(default)]
    pub worker_path: Option<PathBuf>,
}

impl Default for WdmConfig {
    fn default() -> Self {
        Self {
            single_rename: "%id%_p%page_num%".to_string(),
            sequence_rename: "%id%_p%page_num%".to_string(),
            download_dir: None,
            worker_path: None,
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("wdm")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<WdmConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = WdmConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: WdmConfig = toml::from_str(&data)?;
    Ok(cfg)
}
