//! Error types
//!
//! Configuration problems are typed and fatal. Remote failures are carried as
//! [`ApiError`] so the retry layer can classify them without depending on SDK types.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal configuration errors, raised before any remote call is made
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Unknown document kind '{kind}' in {path:?} (expected task, service or cluster)")]
    UnknownKind { path: PathBuf, kind: String },

    #[error("No task or service definition found under {0:?}")]
    Empty(PathBuf),

    #[error("Duplicate {kind} definition '{name}'")]
    Duplicate { kind: &'static str, name: String },

    #[error("Task definition '{task}' is not found for service '{service}'")]
    MissingTaskDefinition { service: String, task: String },

    #[error("Log groups must start with '{prefix}' prefix: '{group}' in task '{task}'")]
    LogGroupPrefix {
        task: String,
        group: String,
        prefix: &'static str,
    },

    #[error("Log configuration of container '{container}' in task '{task}' has no awslogs-group")]
    LogGroupMissing { task: String, container: String },

    #[error("Log stream prefixes must be '{expected}', got '{found}' in task '{task}'")]
    LogStreamPrefix {
        task: String,
        found: String,
        expected: &'static str,
    },

    #[error("Alarm names must start with '{prefix}' prefix: '{alarm}' on service '{service}'")]
    AlarmPrefix {
        service: String,
        alarm: String,
        prefix: &'static str,
    },

    #[error("Alarm '{alarm}' on service '{service}' has no metric definition")]
    AlarmWithoutMetric { service: String, alarm: String },

    #[error("Alarm '{alarm}' references policy '{policy}' which is not declared on service '{service}'")]
    UnknownPolicyReference {
        service: String,
        alarm: String,
        policy: String,
    },

    #[error("Scaling policy '{policy}' for {resource_id} does not exist on AWS")]
    UnresolvedPolicy { policy: String, resource_id: String },

    #[error("Service '{0}' is not found")]
    ServiceNotFound(String),

    #[error("Could not find task definition '{0}'")]
    TaskNotFound(String),

    #[error("Container '{container}' in task '{task}' has no image; pass --image-url")]
    MissingImage { task: String, container: String },

    #[error("Invalid --environment value, expected '[{{\"name\": ..., \"value\": ...}}]': {0}")]
    Environment(#[source] serde_json::Error),
}

/// A failed call to a remote AWS API
#[derive(Error, Debug, Clone)]
#[error("{operation} failed: {message}")]
pub struct ApiError {
    /// SDK operation name, e.g. `DeregisterTaskDefinition`
    pub operation: &'static str,
    /// AWS error code, when the service returned one
    pub code: Option<String>,
    pub message: String,
}

impl ApiError {
    pub fn new(operation: &'static str, code: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            operation,
            code: code.map(str::to_string),
            message: message.into(),
        }
    }

    /// Error code equals `code`
    pub fn has_code(&self, code: &str) -> bool {
        self.code.as_deref() == Some(code)
    }

    /// Throttled by the service
    pub fn is_throttling(&self) -> bool {
        matches!(
            self.code.as_deref(),
            Some("ThrottlingException" | "Throttling" | "TooManyRequestsException")
        )
    }

    /// Throttled, or the message reports an exceeded request rate
    pub fn is_rate_exceeded(&self) -> bool {
        self.is_throttling() || self.message.contains("Rate exceeded")
    }

    pub fn is_not_found(&self) -> bool {
        self.has_code("ObjectNotFoundException")
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
