use std::{net::SocketAddr, path::Path};

use execd_queue::DEFAULT_SIZE_CLASSES;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Read { path: String, #[source] source: std::io::Error },
    #[error("parsing {path}: {source}")]
    Parse { path: String, #[source] source: Box<toml::de::Error> },
}

/// Effective daemon configuration, deserialized from the TOML file named on
/// the command line. Every key is optional except the transport addresses;
/// everything else falls back to the defaults given throughout the design
/// (§6), expressed here as `Default` impls rather than scattered constants.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub transport: TransportConfig,
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub foreground: bool,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_group")]
    pub group: String,
    #[serde(default = "default_rt_priority")]
    pub rt_priority: i32,
}

fn default_user() -> String {
    "ais".to_owned()
}

fn default_group() -> String {
    "ais".to_owned()
}

fn default_rt_priority() -> i32 {
    99
}

#[derive(Debug, Deserialize)]
pub struct TransportConfig {
    pub bind_addr: SocketAddr,
    pub mcast_addr: SocketAddr,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServicesConfig {
    /// Group names to join at bring-up, one per service that exposes an
    /// ordered handler. A service with no entry here never sees ordered
    /// delivery, only local per-client requests.
    #[serde(default)]
    pub groups: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_size_classes")]
    pub size_classes: Vec<(usize, usize)>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { size_classes: default_size_classes() }
    }
}

fn default_size_classes() -> Vec<(usize, usize)> {
    DEFAULT_SIZE_CLASSES.to_vec()
}

#[derive(Debug, Default, Deserialize)]
pub struct LogConfig {
    pub level: Option<String>,
    #[serde(default)]
    pub json: bool,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source: Box::new(source),
        })
    }
}
