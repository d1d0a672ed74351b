//! Configuration error types

use thiserror::Error;

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Missing version field in YAML
    #[error("Missing 'version' field in configuration file. Add 'version: 1' to the top of your YAML file.")]
    MissingVersion,

    /// Unsupported version
    #[error("Unsupported configuration version {found}. Supported versions: {}", .supported.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", "))]
    UnsupportedVersion { found: u32, supported: Vec<u32> },

    /// Identifier that would need escaping beyond quoting
    #[error("Invalid identifier '{value}' for '{field}'. Use letters, digits and underscores, not starting with a digit.")]
    InvalidIdentifier { field: String, value: String },

    /// Fact lookup referencing an undeclared dimension
    #[error("Fact '{fact}' references unknown dimension '{dimension}'")]
    UnknownDimension { fact: String, dimension: String },

    /// Same table declared twice in one layer
    #[error("Table '{table}' is declared more than once in layer '{layer}'")]
    DuplicateTable { layer: String, table: String },

    /// Any other semantic error
    #[error("{0}")]
    Invalid(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ConfigError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    pub fn identifier(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Configuration result type
pub type ConfigResult<T> = Result<T, ConfigError>;
