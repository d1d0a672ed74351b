//! Configuration validation
//!
//! Every identifier that ends up in a rendered statement is checked here, once,
//! at load time. References between registry entries are resolved here too.

use dwh_storage::{Layer, QualifiedName, TableClass};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

use super::error::{ConfigError, ConfigResult};
use super::{DimensionConfig, FactConfig, IndexingEntry, WarehouseConfig};

// ═══════════════════════════════════════════════════════════════════════════
// Validatable Trait
// ═══════════════════════════════════════════════════════════════════════════

/// Trait for validatable configuration objects
pub trait Validatable {
    fn validate(&self) -> ConfigResult<()>;
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,127}$").expect("identifier pattern is valid")
    })
}

/// Check a bare identifier (table, column)
pub fn check_identifier(field: &str, value: &str) -> ConfigResult<()> {
    if identifier_pattern().is_match(value) {
        Ok(())
    } else {
        Err(ConfigError::identifier(field, value))
    }
}

/// Check a `schema.relation` reference
pub fn check_relation(field: &str, value: &str) -> ConfigResult<QualifiedName> {
    let name = QualifiedName::parse(value).map_err(|_| ConfigError::identifier(field, value))?;
    check_identifier(field, &name.schema)?;
    check_identifier(field, &name.name)?;
    Ok(name)
}

fn check_all(field: &str, values: &[String]) -> ConfigResult<()> {
    for (i, value) in values.iter().enumerate() {
        check_identifier(&format!("{}[{}]", field, i), value)?;
    }
    Ok(())
}

fn check_unique_columns(field: &str, values: &[String]) -> ConfigResult<()> {
    let mut seen = HashSet::new();
    for value in values {
        if !seen.insert(value.as_str()) {
            return Err(ConfigError::invalid(format!(
                "{} lists column '{}' more than once",
                field, value
            )));
        }
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════
// Registry Validation
// ═══════════════════════════════════════════════════════════════════════════

impl Validatable for WarehouseConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.load.sentinel > 0 {
            return Err(ConfigError::invalid(format!(
                "load.sentinel must not be positive (surrogate keys start at 1), got {}",
                self.load.sentinel
            )));
        }
        if self.execution.phase_timeout_secs == Some(0) {
            return Err(ConfigError::invalid(
                "execution.phase_timeout_secs must be at least 1",
            ));
        }

        let mut declared: HashSet<(Layer, &str)> = HashSet::new();
        let load_layer = self.load.layer;

        for (i, dim) in self.load.dimensions.iter().enumerate() {
            validate_dimension(&format!("load.dimensions[{}]", i), dim)?;
            if !declared.insert((load_layer, dim.table.as_str())) {
                return Err(duplicate(load_layer, &dim.table));
            }
        }

        for (i, fact) in self.load.facts.iter().enumerate() {
            validate_fact(&format!("load.facts[{}]", i), fact, self)?;
            if !declared.insert((load_layer, fact.table.as_str())) {
                return Err(duplicate(load_layer, &fact.table));
            }
        }

        for (i, entry) in self.indexing.iter().enumerate() {
            validate_indexing(&format!("indexing[{}]", i), entry)?;
            if !declared.insert((entry.layer, entry.table.as_str())) {
                return Err(duplicate(entry.layer, &entry.table));
            }
        }

        Ok(())
    }
}

fn duplicate(layer: Layer, table: &str) -> ConfigError {
    ConfigError::DuplicateTable {
        layer: layer.to_string(),
        table: table.to_string(),
    }
}

fn validate_dimension(field: &str, dim: &DimensionConfig) -> ConfigResult<()> {
    check_identifier(&format!("{}.table", field), &dim.table)?;
    check_relation(&format!("{}.source", field), &dim.source)?;
    check_identifier(&format!("{}.surrogate_key", field), &dim.surrogate_key)?;
    check_identifier(&format!("{}.business_key", field), &dim.business_key)?;
    check_all(&format!("{}.columns", field), &dim.columns)?;
    check_all(&format!("{}.index_columns", field), &dim.index_columns)?;
    check_all(&format!("{}.include_columns", field), &dim.include_columns)?;
    check_unique_columns(&format!("{}.columns", field), &dim.columns)?;
    if let Some(order) = &dim.dedupe_order_by {
        check_identifier(&format!("{}.dedupe_order_by.column", field), &order.column)?;
    }

    if !dim.columns.contains(&dim.business_key) {
        return Err(ConfigError::invalid(format!(
            "{}: columns must include the business key '{}'",
            field, dim.business_key
        )));
    }
    if dim.columns.contains(&dim.surrogate_key) {
        return Err(ConfigError::invalid(format!(
            "{}: surrogate key '{}' is assigned by the load and cannot be a source column",
            field, dim.surrogate_key
        )));
    }
    Ok(())
}

fn validate_fact(field: &str, fact: &FactConfig, config: &WarehouseConfig) -> ConfigResult<()> {
    check_identifier(&format!("{}.table", field), &fact.table)?;
    check_relation(&format!("{}.source", field), &fact.source)?;
    check_all(&format!("{}.columns", field), &fact.columns)?;
    check_unique_columns(&format!("{}.columns", field), &fact.columns)?;

    if fact.columns.is_empty() && fact.lookups.is_empty() {
        return Err(ConfigError::invalid(format!(
            "{}: a fact needs columns or lookups",
            field
        )));
    }

    let mut targets = HashSet::new();
    for (i, lookup) in fact.lookups.iter().enumerate() {
        let lookup_field = format!("{}.lookups[{}]", field, i);
        check_identifier(&format!("{}.natural_key", lookup_field), &lookup.natural_key)?;
        check_identifier(&format!("{}.target_column", lookup_field), &lookup.target_column)?;

        if config.load.dimension(&lookup.dimension).is_none() {
            return Err(ConfigError::UnknownDimension {
                fact: fact.table.clone(),
                dimension: lookup.dimension.clone(),
            });
        }
        if fact.columns.contains(&lookup.target_column) || !targets.insert(&lookup.target_column)
        {
            return Err(ConfigError::invalid(format!(
                "{}: target column '{}' is written twice",
                lookup_field, lookup.target_column
            )));
        }
    }
    Ok(())
}

fn validate_indexing(field: &str, entry: &IndexingEntry) -> ConfigResult<()> {
    check_identifier(&format!("{}.table", field), &entry.table)?;
    check_all(&format!("{}.index_columns", field), &entry.index_columns)?;
    check_all(&format!("{}.include_columns", field), &entry.include_columns)?;

    match entry.class {
        TableClass::Dimension => {
            let surrogate = entry.surrogate_key.as_deref().ok_or_else(|| {
                ConfigError::invalid(format!("{}: dimension entries need surrogate_key", field))
            })?;
            let business = entry.business_key.as_deref().ok_or_else(|| {
                ConfigError::invalid(format!("{}: dimension entries need business_key", field))
            })?;
            check_identifier(&format!("{}.surrogate_key", field), surrogate)?;
            check_identifier(&format!("{}.business_key", field), business)?;
        }
        TableClass::Fact => {
            if !entry.index_columns.is_empty() {
                return Err(ConfigError::invalid(format!(
                    "{}: fact tables get one column-store index; index_columns is not allowed",
                    field
                )));
            }
        }
        TableClass::Unclassified => {
            return Err(ConfigError::invalid(format!(
                "{}: class must be 'dimension' or 'fact'",
                field
            )));
        }
    }
    Ok(())
}
