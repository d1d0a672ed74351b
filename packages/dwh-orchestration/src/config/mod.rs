//! Warehouse configuration
//!
//! Versioned YAML describing where the layers live, how hosts map to
//! environments, and the table registry: which tables are dimensions or facts,
//! where they load from and which columns get indexes.
//!
//! ```yaml
//! version: 1
//! database:
//!   path: warehouse.db
//! environment:
//!   production: ["dwh-prd-*"]
//! load:
//!   layer: cleansed
//!   dimensions:
//!     - table: dim_products
//!       source: raw.v_products
//!       surrogate_key: product_key
//!       business_key: product_id
//!       columns: [product_id, category]
//!       index_columns: [category]
//!   facts:
//!     - table: fact_order_items
//!       source: raw.v_order_items
//!       columns: [order_id, product_id, price]
//!       lookups:
//!         - dimension: dim_products
//!           natural_key: product_id
//!           target_column: product_key
//! ```

pub mod error;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use validation::Validatable;

use dwh_storage::{Layer, OrderBy, TableClass};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Supported configuration schema versions
pub const SUPPORTED_VERSIONS: &[u32] = &[1];

/// Default surrogate value for unresolved fact references
pub const DEFAULT_SENTINEL: i64 = -1;

// ═══════════════════════════════════════════════════════════════════════════
// Schema (v1)
// ═══════════════════════════════════════════════════════════════════════════

/// Root configuration (YAML schema v1)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WarehouseConfig {
    /// Schema version; 0 means the field was absent
    #[serde(default)]
    pub version: u32,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub environment: EnvironmentConfig,

    #[serde(default)]
    pub guard: GuardConfig,

    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub load: LoadConfig,

    /// Index policy for tables outside the load registry
    #[serde(default)]
    pub indexing: Vec<IndexingEntry>,
}

/// Storage locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Main database (holds the audit log)
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    /// Per-layer database files; missing layers sit next to `path`
    #[serde(default)]
    pub layers: BTreeMap<Layer, PathBuf>,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("warehouse.db")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            layers: BTreeMap::new(),
        }
    }
}

impl DatabaseConfig {
    /// Database file of a layer
    pub fn layer_path(&self, layer: Layer) -> PathBuf {
        if let Some(path) = self.layers.get(&layer) {
            return path.clone();
        }
        let dir = self.path.parent().unwrap_or_else(|| Path::new(""));
        dir.join(format!("{}.db", layer.as_str()))
    }
}

/// Host name patterns per environment (`*` matches any run of characters)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentConfig {
    #[serde(default)]
    pub production: Vec<String>,
    #[serde(default)]
    pub test: Vec<String>,
    #[serde(default)]
    pub development: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GuardConfig {
    /// Also require `--force` for index rebuilds in production
    #[serde(default)]
    pub protect_structural_rebuilds: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutionConfig {
    /// Deadline for each phase (cleanup, build, load); none when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase_timeout_secs: Option<u64>,
}

impl ExecutionConfig {
    pub fn phase_timeout(&self) -> Option<Duration> {
        self.phase_timeout_secs.map(Duration::from_secs)
    }
}

/// Dimensional load registry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoadConfig {
    /// Layer holding dimension and fact tables
    #[serde(default = "default_load_layer")]
    pub layer: Layer,

    #[serde(default = "default_sentinel")]
    pub sentinel: i64,

    #[serde(default)]
    pub dimensions: Vec<DimensionConfig>,

    #[serde(default)]
    pub facts: Vec<FactConfig>,
}

fn default_load_layer() -> Layer {
    Layer::Cleansed
}

fn default_sentinel() -> i64 {
    DEFAULT_SENTINEL
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            layer: default_load_layer(),
            sentinel: DEFAULT_SENTINEL,
            dimensions: Vec::new(),
            facts: Vec::new(),
        }
    }
}

impl LoadConfig {
    pub fn dimension(&self, table: &str) -> Option<&DimensionConfig> {
        self.dimensions.iter().find(|d| d.table == table)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DimensionConfig {
    pub table: String,
    /// Cleansing relation as `schema.relation`
    pub source: String,
    pub surrogate_key: String,
    pub business_key: String,
    /// Columns copied from the source; must contain the business key
    pub columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedupe_order_by: Option<OrderBy>,
    /// High-cardinality filter/grouping columns, one index each
    #[serde(default)]
    pub index_columns: Vec<String>,
    /// Columns carried by the filter indexes
    #[serde(default)]
    pub include_columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FactConfig {
    pub table: String,
    /// Cleansing relation as `schema.relation`
    pub source: String,
    /// Columns copied from the source, natural keys included
    pub columns: Vec<String>,
    #[serde(default)]
    pub lookups: Vec<LookupConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LookupConfig {
    /// Dimension table name (declared under `load.dimensions`)
    pub dimension: String,
    /// Source column holding the dimension's business key value
    pub natural_key: String,
    /// Fact column receiving the surrogate key
    pub target_column: String,
}

/// Index policy entry for a table outside the load registry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexingEntry {
    pub layer: Layer,
    pub table: String,
    pub class: TableClass,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surrogate_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_key: Option<String>,
    #[serde(default)]
    pub index_columns: Vec<String>,
    #[serde(default)]
    pub include_columns: Vec<String>,
}

// ═══════════════════════════════════════════════════════════════════════════
// Loading
// ═══════════════════════════════════════════════════════════════════════════

impl WarehouseConfig {
    /// Load and validate a YAML configuration file
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse and validate YAML text
    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let config: WarehouseConfig = serde_yaml::from_str(content)?;

        if config.version == 0 {
            return Err(ConfigError::MissingVersion);
        }
        if !SUPPORTED_VERSIONS.contains(&config.version) {
            return Err(ConfigError::UnsupportedVersion {
                found: config.version,
                supported: SUPPORTED_VERSIONS.to_vec(),
            });
        }

        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Registry classification of a table
    pub fn classify(&self, layer: Layer, table: &str) -> TableClass {
        if layer == self.load.layer {
            if self.load.dimensions.iter().any(|d| d.table == table) {
                return TableClass::Dimension;
            }
            if self.load.facts.iter().any(|f| f.table == table) {
                return TableClass::Fact;
            }
        }
        self.indexing
            .iter()
            .find(|e| e.layer == layer && e.table == table)
            .map(|e| e.class)
            .unwrap_or(TableClass::Unclassified)
    }
}
