//! Volume and drive enumeration.

use crate::config::FsConfig;
use crate::errors::{ErrorKind, FsError, FsResult};
use crate::platform::PlatformFs;
use serde::Serialize;

/// A volume identifier as reported by the OS: a `\\?\Volume{GUID}\` path on
/// Windows, a device or filesystem source name elsewhere. Carries the config
/// of the backend that listed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Volume {
    name: String,
    #[serde(skip)]
    config: FsConfig,
}

impl Volume {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: FsConfig::default(),
        }
    }

    pub fn with_config(mut self, config: FsConfig) -> Self {
        self.config = config;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    fn backend(&self) -> PlatformFs {
        PlatformFs::with_config(self.config.clone())
    }

    /// Kernel device backing the volume, e.g. `\Device\HarddiskVolume3`.
    pub fn device_name(&self) -> FsResult<String> {
        self.backend().volume_device_name(&self.name)
    }

    /// Every path the volume is mounted at (drive letters and folders).
    pub fn mount_paths(&self) -> FsResult<Vec<String>> {
        self.backend().volume_mount_paths(&self.name)
    }
}

pub trait VolumeEnumerator {
    fn volumes(&self) -> FsResult<Vec<Volume>>;

    fn volume_device_name(&self, volume: &str) -> FsResult<String>;

    fn volume_mount_paths(&self, volume: &str) -> FsResult<Vec<String>>;

    /// Root paths of mounted drives (`C:\` on Windows, mount points elsewhere).
    fn drives(&self) -> FsResult<Vec<String>>;
}

/// Validate a `\\?\Volume{GUID}\` name and return the `Volume{GUID}` part
/// that `QueryDosDeviceW` expects (no prefix, no trailing backslash).
pub fn volume_device_query_name(volume: &str) -> FsResult<&str> {
    volume
        .strip_prefix(r"\\?\")
        .and_then(|rest| rest.strip_suffix('\\'))
        .filter(|inner| !inner.is_empty())
        .ok_or_else(|| {
            FsError::new(ErrorKind::Io, "resolve volume", volume)
                .with_detail(r"volume names must look like \\?\Volume{GUID}\")
        })
}

pub fn list_volumes() -> FsResult<Vec<Volume>> {
    PlatformFs::default().volumes()
}

pub fn list_drives() -> FsResult<Vec<String>> {
    PlatformFs::default().drives()
}
