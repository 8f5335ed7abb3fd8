use std::path::PathBuf;

use thiserror::Error;

/// Fatal problems that stop a run before any test case executes.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Base URL is required in configuration.")]
    MissingBaseUrl,

    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Error reading configuration file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error parsing YAML configuration file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid timeout: {0}")]
    InvalidTimeout(f64),

    #[error("Failed to create HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Invalid command line: {0}")]
    Cli(String),

    #[error("Failed to set up logging: {0}")]
    Logging(String),
}

/// A test case definition that cannot be executed at all.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DefinitionError {
    #[error("missing path")]
    MissingPath,

    #[error("invalid HTTP method '{0}'")]
    InvalidMethod(String),
}

/// Why a request never produced a response.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("Timeout")]
    Timeout,

    #[error("ConnectionError")]
    ConnectionError,

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Stand-in body text recorded when no response was received.
    pub fn diagnostic(&self) -> String {
        match self {
            TransportError::Timeout => "Request Timed Out".to_string(),
            TransportError::ConnectionError => "Connection Error".to_string(),
            TransportError::Other(reason) => {
                format!("An unexpected request error occurred: {}", reason)
            }
        }
    }
}

/// Failures while publishing results.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Error writing report to {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error serializing report: {0}")]
    Json(#[from] serde_json::Error),
}
