//! Bootstrap configuration: a TOML file with CLI-argument overrides layered
//! on top, matching the layering order of a typical `Config::load`.
//!
//! Everything here is decided once at startup. Sample rates and the block
//! size cannot be changed while the service is running (§ non-goals); live
//! tuning (gains, stereo mode, RDS fields) instead goes through the control
//! API and [`mpxrds_core::FmModControl`]/[`mpxrds_core::RtpControl`]/RDS
//! `EncoderState`.

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{Error, Result};

fn default_bind_address() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_oscillator_rate() -> u32 {
    228_000
}

fn default_block_size() -> usize {
    1024
}

fn default_output_sample_rate() -> u32 {
    192_000
}

fn default_input_sample_rate() -> u32 {
    48_000
}

fn default_fifo_path() -> PathBuf {
    PathBuf::from("/tmp/mpxrds/mpx.sock")
}

/// Raw shape of the TOML bootstrap file. All fields are optional so an
/// empty or partial file is valid; missing values fall back to the
/// hard-coded defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub input_device: Option<String>,
    pub output_device: Option<String>,
    #[serde(default)]
    pub input_sample_rate: Option<u32>,
    #[serde(default)]
    pub output_sample_rate: Option<u32>,
    #[serde(default)]
    pub oscillator_rate: Option<u32>,
    #[serde(default)]
    pub block_size: Option<usize>,
    #[serde(default)]
    pub bind_address: Option<String>,
    #[serde(default)]
    pub fifo_path: Option<PathBuf>,
    #[serde(default)]
    pub dynamic_ps_path: Option<PathBuf>,
    #[serde(default)]
    pub dynamic_rt_path: Option<PathBuf>,
}

/// Resolved runtime configuration: TOML values with CLI overrides applied,
/// and every field defaulted.
#[derive(Debug, Clone)]
pub struct Config {
    pub input_device: Option<String>,
    pub output_device: Option<String>,
    pub input_sample_rate: u32,
    pub output_sample_rate: u32,
    pub oscillator_rate: u32,
    pub block_size: usize,
    pub bind_address: String,
    pub fifo_path: PathBuf,
    pub dynamic_ps_path: Option<PathBuf>,
    pub dynamic_rt_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_device: None,
            output_device: None,
            input_sample_rate: default_input_sample_rate(),
            output_sample_rate: default_output_sample_rate(),
            oscillator_rate: default_oscillator_rate(),
            block_size: default_block_size(),
            bind_address: default_bind_address(),
            fifo_path: default_fifo_path(),
            dynamic_ps_path: None,
            dynamic_rt_path: None,
        }
    }
}

/// Command-line overrides, one field per flag `main.rs`'s `Args` exposes.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub input_device: Option<String>,
    pub output_device: Option<String>,
    pub bind_address: Option<String>,
    pub fifo_path: Option<PathBuf>,
}

impl Config {
    /// Reads `path` if it exists (a missing bootstrap file is not an error,
    /// unlike a malformed one), then layers `overrides` on top.
    pub fn load(path: &std::path::Path, overrides: Overrides) -> Result<Self> {
        let toml_config = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|e| Error::Config(format!("failed to read config file {}: {e}", path.display())))?;
            toml::from_str::<TomlConfig>(&raw).map_err(|e| Error::Config(format!("failed to parse config file {}: {e}", path.display())))?
        } else {
            TomlConfig::default()
        };

        Ok(Self {
            input_device: overrides.input_device.or(toml_config.input_device),
            output_device: overrides.output_device.or(toml_config.output_device),
            input_sample_rate: toml_config.input_sample_rate.unwrap_or_else(default_input_sample_rate),
            output_sample_rate: toml_config.output_sample_rate.unwrap_or_else(default_output_sample_rate),
            oscillator_rate: toml_config.oscillator_rate.unwrap_or_else(default_oscillator_rate),
            block_size: toml_config.block_size.unwrap_or_else(default_block_size),
            bind_address: overrides.bind_address.or(toml_config.bind_address).unwrap_or_else(default_bind_address),
            fifo_path: overrides.fifo_path.or(toml_config.fifo_path).unwrap_or_else(default_fifo_path),
            dynamic_ps_path: toml_config.dynamic_ps_path,
            dynamic_rt_path: toml_config.dynamic_rt_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = Config::load(std::path::Path::new("/nonexistent/mpxrds.toml"), Overrides::default()).unwrap();
        assert_eq!(cfg.oscillator_rate, 228_000);
        assert_eq!(cfg.block_size, 1024);
    }

    #[test]
    fn cli_override_wins_over_toml_and_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mpxrds.toml");
        std::fs::write(&path, "bind_address = \"0.0.0.0:9000\"\n").unwrap();

        let cfg = Config::load(
            &path,
            Overrides {
                bind_address: Some("0.0.0.0:9999".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(cfg.bind_address, "0.0.0.0:9999");
    }

    #[test]
    fn toml_value_used_when_no_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mpxrds.toml");
        std::fs::write(&path, "bind_address = \"0.0.0.0:9000\"\n").unwrap();

        let cfg = Config::load(&path, Overrides::default()).unwrap();
        assert_eq!(cfg.bind_address, "0.0.0.0:9000");
    }
}
