//! Error types for simulation setup.
//!
//! Only setup can fail. Once `initialize` has returned, a tick degrades
//! (skips an interaction) instead of returning an error.

use thiserror::Error;

/// Errors raised while configuring, loading or starting the simulation.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("failed to read config file: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("failed to load sprite `{path}`: {reason}")]
    AssetLoad { path: String, reason: String },

    #[error("failed to build spawn worker pool: {0}")]
    WorkerPool(String),

    #[error("simulation has not been initialized")]
    NotInitialized,
}
