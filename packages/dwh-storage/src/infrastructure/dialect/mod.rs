//! Dialect implementations

pub mod sqlite;
pub mod tsql;

pub use sqlite::SqliteDialect;
pub use tsql::TSqlDialect;

use crate::domain::Dialect;

/// Look up a dialect by name ("sqlite", "tsql"/"mssql")
pub fn dialect_by_name(name: &str) -> Option<Box<dyn Dialect>> {
    match name.to_lowercase().as_str() {
        "sqlite" => Some(Box::new(SqliteDialect)),
        "tsql" | "mssql" | "sqlserver" => Some(Box::new(TSqlDialect)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_by_name() {
        assert_eq!(dialect_by_name("SQLite").unwrap().name(), "sqlite");
        assert_eq!(dialect_by_name("mssql").unwrap().name(), "tsql");
        assert!(dialect_by_name("oracle").is_none());
    }
}
