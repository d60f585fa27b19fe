//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or checking `site.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("invalid site.toml")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Validation(String),
}
