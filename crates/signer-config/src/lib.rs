//! Runtime configuration: device identity, transport tuning, and the
//! default signing curve.
//!
//! Parses a TOML document with sensible defaults for every field so the
//! device can boot from an empty or missing config file, the same
//! tolerance-of-absence the firmware's settings blob has.

use std::{fs, path::PathBuf};

use anyhow::Result;
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize, Clone)]
pub struct DeviceConfig {
    #[serde(default = "DeviceConfig::default_model")]
    pub model: u32,
    #[serde(default = "DeviceConfig::default_serial")]
    pub serial: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            model: Self::default_model(),
            serial: Self::default_serial(),
        }
    }
}

impl DeviceConfig {
    const fn default_model() -> u32 {
        0x0001_0000
    }

    const fn default_serial() -> u32 {
        0
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct TransportConfig {
    #[serde(default = "TransportConfig::default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "TransportConfig::default_protocol_version")]
    pub protocol_version: u8,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            chunk_size: Self::default_chunk_size(),
            protocol_version: Self::default_protocol_version(),
        }
    }
}

impl TransportConfig {
    const fn default_chunk_size() -> usize {
        506
    }

    const fn default_protocol_version() -> u8 {
        1
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Curve {
    Secp256k1,
    P256,
}

impl Default for Curve {
    fn default() -> Self {
        Curve::Secp256k1
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct RuntimeConfig {
    #[serde(default = "RuntimeConfig::default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    #[serde(default)]
    pub default_curve: Curve,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: Self::default_frame_interval_ms(),
            default_curve: Curve::default(),
        }
    }
}

impl RuntimeConfig {
    const fn default_frame_interval_ms() -> u64 {
        16
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>,
    pub file: ConfigFile,
}

/// Best-effort config path: a local `signer.toml` takes precedence over the
/// platform config directory.
pub fn discover() -> PathBuf {
    let local = PathBuf::from("signer.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("signer").join("signer.toml");
    }
    PathBuf::from("signer.toml")
}

/// Loads configuration from `path`, or `discover()`'s default location.
/// A missing file or a parse error both fall back to defaults rather than
/// failing boot, matching the firmware's tolerance of an uninitialized
/// settings blob.
pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    if let Ok(content) = fs::read_to_string(&path) {
        match toml::from_str::<ConfigFile>(&content) {
            Ok(file) => Ok(Config {
                raw: Some(content),
                file,
            }),
            Err(err) => {
                info!(target: "config", path = %path.display(), error = %err, "falling back to default config after parse error");
                Ok(Config::default())
            }
        }
    } else {
        Ok(Config::default())
    }
}
