use dwh_storage::{Environment, Layer, OperationKind, QualifiedName, StorageError};
use thiserror::Error;

use crate::config::ConfigError;

pub type Result<T> = std::result::Result<T, MaintenanceError>;

/// Step of a table load that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStep {
    Truncate,
    /// Row delete of a cleansed/reporting table during a reset
    Delete,
    Insert,
}

impl LoadStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadStep::Truncate => "truncate",
            LoadStep::Delete => "delete",
            LoadStep::Insert => "insert",
        }
    }
}

impl std::fmt::Display for LoadStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum MaintenanceError {
    #[error(
        "{operation} blocked in {environment} for layer(s) {} (identity: {identity}); pass --force to override",
        .layers.iter().map(|l| l.as_str()).collect::<Vec<_>>().join(", ")
    )]
    GuardRejected {
        operation: OperationKind,
        environment: Environment,
        layers: Vec<Layer>,
        identity: String,
    },

    #[error("Structural failure on {object} ({table}): {source}")]
    Structural {
        object: String,
        table: QualifiedName,
        #[source]
        source: StorageError,
    },

    #[error("Load failure on {table} during {step}: {source}")]
    Load {
        table: QualifiedName,
        step: LoadStep,
        #[source]
        source: StorageError,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    #[error("Load plan cycle detected among: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),

    #[error("Timeout: {phase} exceeded {secs}s")]
    Timeout { phase: String, secs: u64 },

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },
}

impl MaintenanceError {
    pub fn class(&self) -> ErrorClass {
        match self {
            MaintenanceError::GuardRejected { .. } => ErrorClass::GuardRejection,
            MaintenanceError::Structural { .. } => ErrorClass::Structural,
            MaintenanceError::Load { .. } => ErrorClass::Load,
            MaintenanceError::Config(_)
            | MaintenanceError::MissingDependency(_)
            | MaintenanceError::DependencyCycle(_) => ErrorClass::Configuration,
            MaintenanceError::Storage(_)
            | MaintenanceError::Timeout { .. }
            | MaintenanceError::InvalidStateTransition { .. } => ErrorClass::Engine,
        }
    }

    pub fn is_guard_rejection(&self) -> bool {
        matches!(self, MaintenanceError::GuardRejected { .. })
    }
}

/// Failure category recorded in audit details
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Destructive operation refused by the environment guard
    GuardRejection,
    /// Index or constraint drop/create failed
    Structural,
    /// Truncate or insert of a table failed
    Load,
    /// Invalid configuration or load plan
    Configuration,
    /// Engine error outside a named step, or a phase deadline
    Engine,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::GuardRejection => "guard_rejection",
            ErrorClass::Structural => "structural",
            ErrorClass::Load => "load",
            ErrorClass::Configuration => "configuration",
            ErrorClass::Engine => "engine",
        }
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
