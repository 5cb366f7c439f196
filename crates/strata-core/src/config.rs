use directories::{BaseDirs, ProjectDirs};
use eyre::{bail, eyre, Context, Result};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const KB: usize = 1024;
const MB: usize = 1024 * KB;

/// Name of the optional settings file inside the configuration directory.
pub const CONFIG_FILE_NAME: &str = "strata.toml";

static CONFIG_DIR_OVERRIDE: Lazy<RwLock<Option<PathBuf>>> = Lazy::new(|| RwLock::new(None));

/// Tunables handed to a platform backend at construction time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FsConfig {
    /// Intermediate buffer used when copying extent data.
    pub copy_buffer_size: usize,
    /// Allocated-range records requested per query on Windows.
    pub extent_batch_size: usize,
    /// Initial length (in UTF-16 units) of path output buffers.
    pub path_buffer_len: usize,
    /// Buffer used to read a reparse point's data block.
    pub reparse_buffer_size: usize,
    /// Owner reported by backends without POSIX ownership.
    pub placeholder_uid: u64,
    /// Group reported by backends without POSIX ownership.
    pub placeholder_gid: u64,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            copy_buffer_size: MB,
            extent_batch_size: 64,
            path_buffer_len: 260,
            reparse_buffer_size: 16 * KB,
            placeholder_uid: 0,
            placeholder_gid: 0,
        }
    }
}

impl FsConfig {
    /// Load `strata.toml` from the configuration directory, falling back to
    /// defaults when no file exists.
    pub fn load() -> Result<Self> {
        let path = config_dir()?.join(CONFIG_FILE_NAME);
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("no settings at {}; using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("parsing settings {}", path.display()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: FsConfig = toml::from_str(text).map_err(|err| eyre!("{err}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.copy_buffer_size == 0 {
            bail!("copy_buffer_size must be greater than zero");
        }
        if self.extent_batch_size == 0 {
            bail!("extent_batch_size must be greater than zero");
        }
        if self.path_buffer_len == 0 {
            bail!("path_buffer_len must be greater than zero");
        }
        // Header (8 bytes) plus the largest fixed reparse body (12 bytes).
        if self.reparse_buffer_size < 20 {
            bail!("reparse_buffer_size must be at least 20 bytes");
        }
        Ok(())
    }
}

/// Point settings lookup at `dir` for the rest of the process, replacing any
/// earlier override.
pub fn set_config_dir<P: AsRef<Path>>(dir: P) {
    *CONFIG_DIR_OVERRIDE.write() = Some(dir.as_ref().to_path_buf());
}

/// Drop the override and return the directory it pointed at.
pub fn reset_config_dir() -> Option<PathBuf> {
    CONFIG_DIR_OVERRIDE.write().take()
}

/// Directory holding `strata.toml`: the override, else the platform config
/// directory, else `~/.config/strata`.
pub fn config_dir() -> Result<PathBuf> {
    let overridden = CONFIG_DIR_OVERRIDE.read().clone();
    overridden
        .or_else(|| ProjectDirs::from("com", "Strata", "Strata").map(|dirs| dirs.config_dir().to_path_buf()))
        .or_else(|| BaseDirs::new().map(|base| base.home_dir().join(".config").join("strata")))
        .ok_or_else(|| eyre!("no settings directory: no override given and no home directory found"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = FsConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.path_buffer_len, 260);
        assert_eq!(config.placeholder_uid, 0);
    }

    #[test]
    fn partial_toml_keeps_remaining_defaults() {
        let config = FsConfig::from_toml_str("extent_batch_size = 8\n").expect("parse");
        assert_eq!(config.extent_batch_size, 8);
        assert_eq!(config.copy_buffer_size, FsConfig::default().copy_buffer_size);
    }

    #[test]
    fn zero_sized_buffers_are_rejected() {
        assert!(FsConfig::from_toml_str("copy_buffer_size = 0\n").is_err());
        assert!(FsConfig::from_toml_str("reparse_buffer_size = 4\n").is_err());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(FsConfig::from_toml_str("buffer = 1\n").is_err());
    }

    #[test]
    fn override_directory_is_used_for_loading() {
        let temp = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            temp.path().join(CONFIG_FILE_NAME),
            "copy_buffer_size = 4096\nplaceholder_gid = 7\n",
        )
        .expect("write settings");

        set_config_dir(temp.path());
        assert_eq!(config_dir().expect("config dir"), temp.path());
        let loaded = FsConfig::load().expect("load");
        assert_eq!(reset_config_dir().as_deref(), Some(temp.path()));

        assert_eq!(loaded.copy_buffer_size, 4096);
        assert_eq!(loaded.placeholder_gid, 7);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let loaded = FsConfig::load_from(&temp.path().join(CONFIG_FILE_NAME)).expect("load");
        assert_eq!(loaded, FsConfig::default());
    }
}
