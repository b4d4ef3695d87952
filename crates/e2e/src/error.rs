//! Error types for E2E testing

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Server failed to start: {0}")]
    ServerStartup(String),

    #[error("Server health check failed after {0} attempts")]
    ServerHealthCheck(usize),

    #[error("Playwright not found. Install with: npm i -D playwright && npx playwright install")]
    DriverNotFound,

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Driver bridge closed: {0}")]
    BridgeClosed(String),

    #[error("Unsupported selector: {0}")]
    Selector(String),

    #[error("Scenario spec parse error: {0}")]
    SpecParse(String),

    #[error("Step failed: {step} - {reason}")]
    StepFailed { step: String, reason: String },

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error(transparent)]
    Domain(#[from] todo_common::Error),
}

pub type E2eResult<T> = Result<T, E2eError>;

/// How a failed scenario is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Expected DOM state was not observed
    Assertion,
    /// An action, navigation or expectation ran out of time
    Timeout,
    /// Target unreachable, driver crashed, bad configuration
    Environment,
}

impl E2eError {
    pub fn kind(&self) -> FailureKind {
        match self {
            E2eError::AssertionFailed(_) | E2eError::StepFailed { .. } => FailureKind::Assertion,
            E2eError::Timeout(_) => FailureKind::Timeout,
            _ => FailureKind::Environment,
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Assertion => write!(f, "assertion"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Environment => write!(f, "environment"),
        }
    }
}
