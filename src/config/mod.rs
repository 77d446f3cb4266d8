//! Configuration module for the kline loader.
//!
//! Settings are read from environment variables (optionally populated from
//! an env file by the binary) and can be overridden by CLI flags.

mod loader_config;

pub use loader_config::{DEFAULT_DATABASE_URL, LoaderConfig};
