use anyhow::Context as _;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::runtime_config::DispatcherConfig;

pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_WORKERS: usize = 4;

/// Listener and dispatcher settings for `brrtmux serve`.
///
/// Precedence, lowest first: built-in defaults, `BRRTMUX_*` environment
/// variables, the TOML file, command-line flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub addr: String,
    pub workers: usize,
    pub max_body_bytes: u64,
    pub pool_capacity: usize,
}

/// On-disk shape. Every key is optional; absent keys keep the lower layer.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    addr: Option<String>,
    workers: Option<usize>,
    max_body_bytes: Option<u64>,
    pool_capacity: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::with_dispatcher(DispatcherConfig::default())
    }
}

impl ServerConfig {
    fn with_dispatcher(dispatcher: DispatcherConfig) -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            workers: DEFAULT_WORKERS,
            max_body_bytes: dispatcher.max_body_bytes,
            pool_capacity: dispatcher.pool_capacity,
        }
    }

    /// Defaults overlaid with the `BRRTMUX_*` environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::with_dispatcher(DispatcherConfig::from_env())
    }

    /// Overlay a TOML document.
    ///
    /// # Errors
    ///
    /// Fails on malformed TOML, unknown keys, or zero-valued limits.
    pub fn merge_toml(mut self, source: &str) -> anyhow::Result<Self> {
        let file: ConfigFile = toml::from_str(source).context("invalid server config")?;
        if let Some(addr) = file.addr {
            self.addr = addr;
        }
        if let Some(workers) = file.workers {
            self.workers = workers;
        }
        if let Some(max_body_bytes) = file.max_body_bytes {
            self.max_body_bytes = max_body_bytes;
        }
        if let Some(pool_capacity) = file.pool_capacity {
            self.pool_capacity = pool_capacity;
        }
        self.validate()?;
        Ok(self)
    }

    /// Overlay the TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or does not parse.
    pub fn merge_file(self, path: &Path) -> anyhow::Result<Self> {
        let source = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        self.merge_toml(&source)
            .with_context(|| format!("failed to load config file {}", path.display()))
    }

    /// Apply command-line overrides.
    #[must_use]
    pub fn with_overrides(mut self, addr: Option<String>, workers: Option<usize>) -> Self {
        if let Some(addr) = addr {
            self.addr = addr;
        }
        if let Some(workers) = workers {
            self.workers = workers;
        }
        self
    }

    #[must_use]
    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            max_body_bytes: self.max_body_bytes,
            pool_capacity: self.pool_capacity,
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.workers > 0, "workers must be at least 1");
        anyhow::ensure!(self.max_body_bytes > 0, "max_body_bytes must be positive");
        anyhow::ensure!(self.pool_capacity > 0, "pool_capacity must be positive");
        Ok(())
    }
}
