//! Configuration loading and validation.
//!
//! Configuration is layered with [figment], later layers overriding earlier
//! ones:
//!
//! 1. Built-in defaults ([`Config::default`]).
//! 2. A config file: either the one passed explicitly, or the first of
//!    `config.toml`, `config.yaml`, `config.yml` and `config.json` found in the
//!    platform config directory.
//! 3. Environment variables prefixed with `PBSYNC_`, nested with `__`
//!    (e.g. `PBSYNC_DEVICE__MAIN=/media/user/PB626`).
//!
//! # Example
//!
//! ```toml
//! [device]
//! main = "/media/user/PB626"
//! card = "/media/user/SDCARD"
//! profile = "pocketbook-626"
//!
//! [volumes]
//! main_root = "/"
//! card_root = "/card"
//!
//! [sync]
//! cache_file = "metadata.pbsync.json"
//! dry_run = false
//! ```

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::{OptionExt, ResultExt};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "PBSYNC_";
/// `PBSYNC_CONFIG` names the config file itself and is not a config key.
const ENV_CONFIG_FILE: &str = "config";
const CONFIG_STEM: &str = "config";
const CONFIG_EXTENSIONS: [&str; 4] = ["toml", "yaml", "yml", "json"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub device: DeviceConfig,
    pub volumes: VolumesConfig,
    pub sync: SyncConfig,
}

/// Where the reader is mounted on the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceConfig {
    /// Mount point of the reader's main memory. Required.
    pub main: Option<PathBuf>,
    /// Mount point of the storage card, if one is inserted.
    pub card: Option<PathBuf>,
    /// Device profile name; the generic PocketBook profile when unset.
    pub profile: Option<String>,
}

/// Labels substituted for the device's `/mnt/extN` mount markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VolumesConfig {
    pub main_root: String,
    pub card_root: String,
}
impl Default for VolumesConfig {
    fn default() -> Self {
        Self {
            main_root: "/".to_string(),
            card_root: "/card".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Booklist cache file name, stored at the root of each volume.
    pub cache_file: String,
    /// Reconcile and report without writing anything back to the reader.
    pub dry_run: bool,
}
impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cache_file: "metadata.pbsync.json".to_string(),
            dry_run: false,
        }
    }
}

impl Config {
    /// Load and validate configuration from all layers.
    ///
    /// An explicitly passed file must exist; the default file is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let file = match explicit {
            Some(path) if !path.is_file() => exn::bail!(ErrorKind::NotFound(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_file(),
        };
        match &file {
            Some(path) => tracing::debug!(path = %path.display(), "Loading configuration file"),
            None => tracing::debug!("No configuration file found, using defaults and environment"),
        }
        let figment = Self::figment(file.as_deref())?.merge(Self::env());
        Self::from_figment(figment)
    }

    /// Defaults layered with a config file, without the environment.
    pub fn figment(file: Option<&Path>) -> Result<Figment> {
        let figment = Figment::from(Serialized::defaults(Config::default()));
        let Some(path) = file else {
            return Ok(figment);
        };
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_raise(|| ErrorKind::UnsupportedFormat(path.to_path_buf()))?;
        Ok(match extension.to_ascii_lowercase().as_str() {
            "toml" => figment.merge(Toml::file_exact(path)),
            "yaml" | "yml" => figment.merge(Yaml::file_exact(path)),
            "json" => figment.merge(Json::file_exact(path)),
            _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
        })
    }

    /// The environment layer: `PBSYNC_` variables, nested with `__`.
    pub fn env() -> Env {
        Env::prefixed(ENV_PREFIX).ignore(&[ENV_CONFIG_FILE]).split("__")
    }

    /// Extract and validate a configuration.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().or_raise(|| ErrorKind::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// First default config file that exists in the platform config directory.
    pub fn default_file() -> Option<PathBuf> {
        let dirs = ProjectDirs::from("", "", "pbsync")?;
        CONFIG_EXTENSIONS
            .iter()
            .map(|ext| dirs.config_dir().join(format!("{CONFIG_STEM}.{ext}")))
            .find(|path| path.is_file())
    }

    fn validate(&self) -> Result<()> {
        match &self.device.main {
            None => exn::bail!(ErrorKind::Invalid("device.main")),
            Some(path) if !path.is_absolute() => exn::bail!(ErrorKind::Invalid("device.main")),
            Some(_) => {},
        }
        if self.device.card.as_ref().is_some_and(|path| !path.is_absolute()) {
            exn::bail!(ErrorKind::Invalid("device.card"));
        }
        if !is_storage_root(&self.volumes.main_root) {
            exn::bail!(ErrorKind::Invalid("volumes.main_root"));
        }
        if !is_storage_root(&self.volumes.card_root) || self.volumes.card_root == self.volumes.main_root {
            exn::bail!(ErrorKind::Invalid("volumes.card_root"));
        }
        let cache_file = self.sync.cache_file.as_str();
        if cache_file.is_empty() || cache_file == "." || cache_file == ".." || cache_file.contains(['/', '\\', '\0']) {
            exn::bail!(ErrorKind::Invalid("sync.cache_file"));
        }
        Ok(())
    }
}

fn is_storage_root(root: &str) -> bool {
    root.starts_with('/') && !root.contains('\\') && !root.split('/').any(|part| part == "..")
}
