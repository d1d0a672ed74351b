//! Environment detection
//!
//! The environment is derived from the host identity once per invocation and
//! carried explicitly in an [`EnvironmentContext`]; nothing here is global.

use dwh_storage::Environment;
use regex::{Regex, RegexBuilder};
use uuid::Uuid;

use crate::config::{ConfigError, ConfigResult, EnvironmentConfig};

/// Identity used when neither a flag nor the environment provides one
pub const UNKNOWN_IDENTITY: &str = "unknown";

/// Classifies host names with `*` wildcard patterns
///
/// Production patterns are checked first, then test, then development.
/// Hosts matching nothing are Development.
#[derive(Debug, Clone)]
pub struct EnvironmentDetector {
    rules: Vec<(Environment, Regex)>,
}

impl EnvironmentDetector {
    pub fn new(config: &EnvironmentConfig) -> ConfigResult<Self> {
        let mut rules = Vec::new();
        for (environment, patterns) in [
            (Environment::Production, &config.production),
            (Environment::Test, &config.test),
            (Environment::Development, &config.development),
        ] {
            for pattern in patterns {
                rules.push((environment, wildcard_regex(pattern)?));
            }
        }
        Ok(Self { rules })
    }

    pub fn detect(&self, host: &str) -> Environment {
        self.rules
            .iter()
            .find(|(_, regex)| regex.is_match(host))
            .map(|(environment, _)| *environment)
            .unwrap_or_default()
    }
}

fn wildcard_regex(pattern: &str) -> ConfigResult<Regex> {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    RegexBuilder::new(&format!("^{}$", body))
        .case_insensitive(true)
        .build()
        .map_err(|e| ConfigError::invalid(format!("host pattern '{}': {}", pattern, e)))
}

/// Per-invocation execution context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentContext {
    pub environment: Environment,
    pub host: String,
    pub identity: String,
    /// Correlates the audit entries of one invocation
    pub run_id: Uuid,
}

impl EnvironmentContext {
    pub fn new(
        environment: Environment,
        host: impl Into<String>,
        identity: impl Into<String>,
    ) -> Self {
        Self {
            environment,
            host: host.into(),
            identity: identity.into(),
            run_id: Uuid::new_v4(),
        }
    }

    /// Classify `host` and build the context for this invocation
    pub fn detect(
        detector: &EnvironmentDetector,
        host: impl Into<String>,
        identity: impl Into<String>,
    ) -> Self {
        let host = host.into();
        let environment = detector.detect(&host);
        Self::new(environment, host, identity)
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

/// Host name as the operating system reports it
///
/// Falls back to `HOSTNAME` / `COMPUTERNAME` when the OS lookup fails, and to
/// an empty name (Development) when neither is available.
pub fn current_host() -> String {
    match hostname::get() {
        Ok(name) if !name.is_empty() => name.to_string_lossy().into_owned(),
        _ => std::env::var("HOSTNAME")
            .or_else(|_| std::env::var("COMPUTERNAME"))
            .unwrap_or_default(),
    }
}

/// Acting identity from `USER` / `USERNAME`
pub fn current_identity() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| UNKNOWN_IDENTITY.to_string())
}
