use strata_core::config::{self, FsConfig};
use strata_core::PlatformFs;

/// Per-invocation state shared by the command handlers.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub fs: PlatformFs,
    pub json: bool,
}

impl AppContext {
    pub fn load(json: bool) -> Self {
        let config = match FsConfig::load() {
            Ok(config) => config,
            Err(err) => {
                log::warn!(
                    "failed to read {} (using defaults): {err:#}",
                    config::CONFIG_FILE_NAME
                );
                FsConfig::default()
            }
        };
        log::debug!("effective configuration: {config:?}");
        Self {
            fs: PlatformFs::with_config(config),
            json,
        }
    }
}
