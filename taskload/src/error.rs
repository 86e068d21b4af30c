use taskload_core::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("Unable to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Setup failed: {0}")]
    Setup(String),
}
