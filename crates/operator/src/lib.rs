pub mod clock;
pub mod config;
pub mod controllers;
pub mod crd;
pub mod jobset;
pub mod metrics;
#[cfg(feature = "server")]
pub mod server;
pub mod store;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Kubernetes error: {0}")]
    Kubernetes(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Templating error: {0}")]
    Templating(String),
    #[error("Precondition violated: {0}")]
    Precondition(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Errors that only go away when the JobSet spec changes.
    pub fn is_templating(&self) -> bool {
        matches!(self, Error::Templating(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
