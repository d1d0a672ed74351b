//! SQLite Warehouse
//!
//! One SQLite connection with every layer attached as its own schema
//! (`raw`, `cleansed`, `reporting`). The main database holds the audit log.
//!
//! Statements run on tokio's blocking pool so a phase deadline can fire while
//! a statement is in flight; [`Warehouse::interrupt`] then aborts it through
//! the connection's interrupt handle.

mod audit;

pub use audit::SqliteAuditLog;

use async_trait::async_trait;
use rusqlite::{params, Connection, InterruptHandle, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::domain::{
    CatalogObject, Dialect, Layer, MaintenanceStatement, ObjectKind, QualifiedName, Warehouse,
};
use crate::error::StorageError;
use crate::infrastructure::dialect::SqliteDialect;
use crate::Result;

/// SQLite-based Warehouse implementation
#[derive(Clone)]
pub struct SqliteWarehouse {
    conn: Arc<Mutex<Connection>>,
    interrupt: Arc<InterruptHandle>,
    dialect: SqliteDialect,
}

impl SqliteWarehouse {
    /// Open the main database at `db_path` and attach the given layer files
    pub fn open<P: AsRef<Path>>(db_path: P, layers: &[(Layer, P)]) -> Result<Self> {
        let warehouse = Self::from_connection(Connection::open(db_path)?);
        for (layer, path) in layers {
            let path = path.as_ref().to_string_lossy().into_owned();
            warehouse.attach(*layer, &path)?;
        }
        Ok(warehouse)
    }

    /// Create an in-memory warehouse with each layer attached as its own
    /// in-memory database (for testing)
    pub fn in_memory(layers: &[Layer]) -> Result<Self> {
        let warehouse = Self::from_connection(Connection::open_in_memory()?);
        for layer in layers {
            warehouse.attach(*layer, ":memory:")?;
        }
        Ok(warehouse)
    }

    fn from_connection(conn: Connection) -> Self {
        let interrupt = Arc::new(conn.get_interrupt_handle());
        Self {
            conn: Arc::new(Mutex::new(conn)),
            interrupt,
            dialect: SqliteDialect,
        }
    }

    /// Attach a layer schema; attaching an already attached layer is a no-op
    pub fn attach(&self, layer: Layer, path: &str) -> Result<()> {
        self.with_conn(|conn| {
            if schema_exists(conn, layer.schema_name())? {
                return Ok(());
            }
            conn.execute("ATTACH DATABASE ?1 AS ?2", params![path, layer.schema_name()])?;
            debug!(layer = %layer, path, "attached layer schema");
            Ok(())
        })
    }

    /// Audit log sharing this warehouse's connection
    pub fn audit_log(&self) -> Result<SqliteAuditLog> {
        SqliteAuditLog::from_shared(Arc::clone(&self.conn))
    }

    /// Run a closure against the connection on the calling thread
    ///
    /// Used for setup (DDL of raw tables, cleansing views) and by tests.
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StorageError::database("SQLite connection mutex poisoned"))?;
        f(&conn)
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| StorageError::database("SQLite connection mutex poisoned"))?;
            f(&conn)
        })
        .await
        .map_err(|e| StorageError::database(format!("blocking task failed: {}", e)))?
    }
}

fn schema_exists(conn: &Connection, schema: &str) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM pragma_database_list WHERE name = ?1",
            params![schema],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Classify an index created through the lifecycle naming convention
///
/// `pk_*` unique indexes are primary keys, other unique indexes are unique
/// constraints, `cci_*` indexes are column-store indexes.
pub(crate) fn classify_index(name: &str, unique: bool) -> ObjectKind {
    let lower = name.to_lowercase();
    if unique && lower.starts_with("pk_") {
        ObjectKind::PrimaryKey
    } else if unique {
        ObjectKind::UniqueConstraint
    } else if lower.starts_with("cci_") {
        ObjectKind::ColumnStoreIndex
    } else {
        ObjectKind::RowStoreIndex
    }
}

fn is_unique_ddl(sql: &str) -> bool {
    sql.trim_start()
        .to_uppercase()
        .starts_with("CREATE UNIQUE INDEX")
}

#[async_trait]
impl Warehouse for SqliteWarehouse {
    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    async fn layer_exists(&self, layer: Layer) -> Result<bool> {
        self.blocking(move |conn| schema_exists(conn, layer.schema_name()))
            .await
    }

    async fn list_tables(&self, layer: Layer) -> Result<Vec<String>> {
        let schema = self.dialect.quote_ident(layer.schema_name());
        self.blocking(move |conn| {
            if !schema_exists(conn, layer.schema_name())? {
                return Ok(Vec::new());
            }
            let mut stmt = conn.prepare(&format!(
                "SELECT name FROM {}.sqlite_master
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
                 ORDER BY name",
                schema
            ))?;
            let tables = stmt
                .query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(tables)
        })
        .await
    }

    async fn list_objects(&self, layer: Layer) -> Result<Vec<CatalogObject>> {
        let schema = self.dialect.quote_ident(layer.schema_name());
        self.blocking(move |conn| {
            if !schema_exists(conn, layer.schema_name())? {
                return Ok(Vec::new());
            }
            // Auto-indexes have no DDL (sql IS NULL): they belong to the table
            // definition and cannot be dropped on their own.
            let mut stmt = conn.prepare(&format!(
                "SELECT name, tbl_name, sql FROM {}.sqlite_master
                 WHERE type = 'index' AND sql IS NOT NULL
                 ORDER BY tbl_name, name",
                schema
            ))?;
            let objects = stmt
                .query_map([], |row| {
                    let name: String = row.get(0)?;
                    let table: String = row.get(1)?;
                    let sql: String = row.get(2)?;
                    let kind = classify_index(&name, is_unique_ddl(&sql));
                    Ok(CatalogObject::new(name, layer.table(table), kind))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(objects)
        })
        .await
    }

    async fn table_columns(&self, table: &QualifiedName) -> Result<Vec<String>> {
        let table = table.clone();
        self.blocking(move |conn| {
            let mut stmt =
                conn.prepare("SELECT name FROM pragma_table_info(?1, ?2) ORDER BY cid")?;
            let columns = stmt
                .query_map(params![table.name, table.schema], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(columns)
        })
        .await
    }

    async fn count_rows(&self, table: &QualifiedName, filter: Option<(&str, i64)>) -> Result<u64> {
        let mut sql = format!("SELECT COUNT(*) FROM {}", self.dialect.qualify(table));
        let value = match filter {
            Some((column, value)) => {
                sql.push_str(&format!(" WHERE {} = ?1", self.dialect.quote_ident(column)));
                Some(value)
            }
            None => None,
        };
        self.blocking(move |conn| {
            let count: i64 = match value {
                Some(v) => conn.query_row(&sql, params![v], |row| row.get(0))?,
                None => conn.query_row(&sql, [], |row| row.get(0))?,
            };
            Ok(count as u64)
        })
        .await
    }

    async fn execute(&self, statement: &MaintenanceStatement) -> Result<u64> {
        let sql = self.dialect.render(statement);
        debug!(statement = %statement, sql = %sql, "executing");
        self.blocking(move |conn| {
            let changed = conn.execute(&sql, [])?;
            Ok(changed as u64)
        })
        .await
    }

    fn interrupt(&self) {
        self.interrupt.interrupt();
    }
}
