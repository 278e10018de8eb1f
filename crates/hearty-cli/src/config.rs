// Copyright 2024 Hearty Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runtime configuration: an optional TOML file, overridden by CLI flags.
//! No environment variable layer is needed — every setting already has a
//! flag, and a config file covers the rest.

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Defaults good enough for a single-machine dev setup.
pub const DEFAULT_BASE_PATH: &str = "/tmp/hearty";
pub const DEFAULT_SERVER_ADDR: &str = "0.0.0.0:2546";
pub const DEFAULT_CACHE_DIR: &str = "/tmp/hearty-store-cache";
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartyConfig {
    pub base_path: PathBuf,
    pub server_addr: SocketAddr,
    pub cache_dir: PathBuf,
    pub cache_capacity: usize,
    pub log_filter: String,
}

impl Default for HeartyConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from(DEFAULT_BASE_PATH),
            server_addr: DEFAULT_SERVER_ADDR.parse().expect("valid default addr"),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            cache_capacity: hearty_cache::DEFAULT_CAPACITY,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl HeartyConfig {
    /// Loads a config file if `path` is given and exists, then overlays the
    /// non-default fields a caller supplies directly (CLI flags always
    /// win over the file).
    pub fn load(path: Option<&std::path::Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) if p.exists() => {
                let raw = std::fs::read_to_string(p)?;
                Ok(toml::from_str(&raw)?)
            }
            _ => Ok(Self::default()),
        }
    }
}
