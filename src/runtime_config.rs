//! # Runtime Configuration Module
//!
//! Environment-driven settings for the dispatcher.
//!
//! ## Environment Variables
//!
//! ### `BRRTMUX_MAX_BODY_BYTES`
//!
//! Upper bound on request bodies read through [`Context::decode_json`] and
//! [`Context::body_bytes`]. Accepts decimal (`1048576`) or hexadecimal
//! (`0x100000`). Default: 1 MiB.
//!
//! ### `BRRTMUX_POOL_CAPACITY`
//!
//! Number of idle request contexts kept for reuse. Contexts beyond this are
//! dropped on release rather than pooled. Default: `1024`.
//!
//! ## Usage
//!
//! ```rust
//! use brrtmux::runtime_config::DispatcherConfig;
//!
//! let config = DispatcherConfig::from_env();
//! assert!(config.max_body_bytes > 0);
//! ```
//!
//! [`Context::decode_json`]: crate::Context::decode_json
//! [`Context::body_bytes`]: crate::Context::body_bytes

use std::env;
use tracing::warn;

use crate::binding::DEFAULT_MAX_BODY_BYTES;
use crate::context::DEFAULT_POOL_CAPACITY;

pub const ENV_MAX_BODY_BYTES: &str = "BRRTMUX_MAX_BODY_BYTES";
pub const ENV_POOL_CAPACITY: &str = "BRRTMUX_POOL_CAPACITY";

/// Settings fixed when the router is frozen into a dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Body size limit in bytes (default: 1 MiB)
    pub max_body_bytes: u64,
    /// Idle contexts retained by the pool (default: 1024)
    pub pool_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            pool_capacity: DEFAULT_POOL_CAPACITY,
        }
    }
}

impl DispatcherConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let max_body_bytes = lookup(ENV_MAX_BODY_BYTES)
            .and_then(|v| parse_number(ENV_MAX_BODY_BYTES, &v))
            .filter(|n| *n > 0)
            .unwrap_or(defaults.max_body_bytes);
        let pool_capacity = lookup(ENV_POOL_CAPACITY)
            .and_then(|v| parse_number(ENV_POOL_CAPACITY, &v))
            .and_then(|n| usize::try_from(n).ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.pool_capacity);
        Self {
            max_body_bytes,
            pool_capacity,
        }
    }
}

fn parse_number(key: &str, raw: &str) -> Option<u64> {
    let raw = raw.trim();
    let parsed = match raw.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    };
    if parsed.is_none() {
        warn!(key, value = raw, "ignoring unparsable environment value");
    }
    parsed
}
