//! On-disk CLI config (spec.md §6.3's scoped-out "config file discovery"):
//! connection defaults a user doesn't want to retype on every invocation.
//! Mirrors `flowctl::config::Config`'s shape (a plain `serde`-derived
//! struct loaded from one file, `Default` when absent) but for TOML rather
//! than JSON, matching this crate's declared `toml` dependency.

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CliConfig {
    pub account_locator: Option<String>,
    pub org: Option<String>,
    #[serde(default)]
    pub available_roles: HashSet<String>,
}

impl CliConfig {
    /// `~/.config/snowcap/config.toml` (platform-appropriate via
    /// `directories::ProjectDirs`). Returns `None` when the platform has no
    /// notion of a config directory at all, never when the file is merely
    /// absent.
    fn path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "snowcap").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load the on-disk config, or `CliConfig::default()` if it doesn't
    /// exist. A malformed file is still an error: typo'd config should not
    /// be silently ignored.
    pub fn load() -> anyhow::Result<Self> {
        let Some(path) = Self::path() else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("parsing config file {}", path.display()))
    }
}
