//! Crate-wide configuration: drive addresses, axis limits, and protocol
//! timeouts. Loadable from a TOML file via `serde`, mirroring the
//! teacher's [`crate::error`]-style hand-rolled error enum rather than
//! `thiserror`.

use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec::motion_command::schema;
use crate::codec::CommandParameter;
use crate::drive::DriveConfig;

/// Static configuration for one linear axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveAxisConfig {
    pub ip: Ipv4Addr,
    pub name: String,
    pub min_position: Option<f64>,
    pub max_position: Option<f64>,
}

/// Crate-wide configuration for the three-axis manipulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManipulatorConfig {
    pub drives: [DriveAxisConfig; 3],
    pub response_timeout_ms: u64,
    pub max_send_attempts: u32,
}

impl Default for ManipulatorConfig {
    fn default() -> Self {
        ManipulatorConfig {
            drives: [
                DriveAxisConfig {
                    ip: Ipv4Addr::new(192, 168, 131, 251),
                    name: "DRIVE_1".to_string(),
                    min_position: Some(0.0),
                    max_position: Some(0.185),
                },
                DriveAxisConfig {
                    ip: Ipv4Addr::new(192, 168, 131, 252),
                    name: "DRIVE_2".to_string(),
                    min_position: Some(0.0),
                    max_position: Some(0.18),
                },
                DriveAxisConfig {
                    ip: Ipv4Addr::new(192, 168, 131, 253),
                    name: "DRIVE_3".to_string(),
                    min_position: None,
                    max_position: None,
                },
            ],
            response_timeout_ms: 2_000,
            max_send_attempts: 5,
        }
    }
}

impl ManipulatorConfig {
    /// Parse configuration from a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(ConfigError::Parse)
    }

    /// Load configuration from a TOML file on disk.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_toml_str(&contents)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    /// Build the per-drive worker configs this crate's [`crate::drive::Drive`]
    /// takes at spawn time. Every axis is configured with the same single
    /// signed-velocity monitoring-channel slot; the other three slots are
    /// left unconfigured.
    pub fn drive_configs(&self) -> [DriveConfig; 3] {
        let monitoring_channel_parameters: [Option<CommandParameter>; 4] =
            [Some(schema::VELOCITY_SIGNED), None, None, None];

        self.drives.clone().map(|axis| DriveConfig {
            ip: axis.ip,
            name: axis.name,
            min_position: axis.min_position,
            max_position: axis.max_position,
            monitoring_channel_parameters,
            response_timeout: self.response_timeout(),
            max_send_attempts: self.max_send_attempts,
        })
    }
}

/// Failure to load or parse a [`ManipulatorConfig`].
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "failed to read config file: {e}"),
            ConfigError::Parse(e) => write!(f, "failed to parse config: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}
