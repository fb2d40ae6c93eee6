//! # CLI Module
//!
//! Command-line entry point for the `brrtmux` binary.
//!
//! ## Commands
//!
//! ### `serve`
//!
//! Serves a small demo API on a `tiny_http` listener:
//!
//! ```bash
//! brrtmux serve --addr 0.0.0.0:8080 --workers 8
//! brrtmux serve --config brrtmux.toml
//! ```
//!
//! The config file is TOML; every key is optional:
//!
//! ```toml
//! addr = "0.0.0.0:8080"
//! workers = 8
//! max_body_bytes = 65536
//! pool_capacity = 256
//! ```
//!
//! Flags override the file, which overrides `BRRTMUX_*` environment variables.
//!
//! ### `routes`
//!
//! Prints the demo route table, one `METHOD PATTERN` per line.

mod commands;
mod config;
mod demo;

pub use commands::{resolve_config, run, run_cli, Cli, Commands};
pub use config::{ServerConfig, DEFAULT_ADDR, DEFAULT_WORKERS};
pub use demo::router as demo_router;
