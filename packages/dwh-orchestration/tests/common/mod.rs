//! Shared fixture for the integration tests
//!
//! An in-memory warehouse with every layer attached, raw source tables and
//! their cleansing views, empty cleansed/reporting tables, plus port fakes
//! for failure paths.

#![allow(dead_code)]

use async_trait::async_trait;
use dwh_orchestration::{EnvironmentContext, MaintenanceService, WarehouseConfig};
use dwh_storage::{
    AuditEntry, AuditRecord, AuditSink, CatalogObject, Dialect, Environment, InMemoryAuditLog,
    Layer, MaintenanceStatement, QualifiedName, SqliteWarehouse, StorageError, Warehouse,
};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const CONFIG: &str = r#"
version: 1
environment:
  production: ["dwh-prd-*"]
  test: ["dwh-uat-*"]
load:
  layer: cleansed
  dimensions:
    - table: dim_products
      source: raw.v_products
      surrogate_key: product_key
      business_key: product_id
      columns: [product_id, category, product_name]
      dedupe_order_by: { column: updated_at, direction: desc }
      index_columns: [category]
      include_columns: [product_name]
    - table: dim_sellers
      source: raw.v_sellers
      surrogate_key: seller_key
      business_key: seller_id
      columns: [seller_id, seller_city]
      index_columns: [seller_city]
  facts:
    - table: fact_order_items
      source: raw.v_order_items
      columns: [order_id, order_item_id, product_id, seller_id, price]
      lookups:
        - dimension: dim_products
          natural_key: product_id
          target_column: product_key
        - dimension: dim_sellers
          natural_key: seller_id
          target_column: seller_key
indexing:
  - layer: reporting
    table: rpt_daily_sales
    class: fact
"#;

const SCHEMA: &str = "
CREATE TABLE raw.products (product_id TEXT, category TEXT, product_name TEXT, updated_at TEXT);
CREATE TABLE raw.sellers (seller_id TEXT, seller_city TEXT);
CREATE TABLE raw.order_items (order_id TEXT, order_item_id INTEGER, product_id TEXT, seller_id TEXT, price REAL);

CREATE VIEW raw.v_products AS
    SELECT TRIM(product_id) AS product_id, LOWER(TRIM(category)) AS category, product_name, updated_at
    FROM products;
CREATE VIEW raw.v_sellers AS
    SELECT TRIM(seller_id) AS seller_id, UPPER(seller_city) AS seller_city FROM sellers;
CREATE VIEW raw.v_order_items AS
    SELECT order_id, order_item_id, TRIM(product_id) AS product_id, TRIM(seller_id) AS seller_id, price
    FROM order_items;

CREATE TABLE cleansed.dim_products (
    product_key INTEGER, product_id TEXT, category TEXT, product_name TEXT
);
CREATE TABLE cleansed.dim_sellers (seller_key INTEGER, seller_id TEXT, seller_city TEXT);
CREATE TABLE cleansed.fact_order_items (
    order_id TEXT, order_item_id INTEGER, product_id TEXT, seller_id TEXT, price REAL,
    product_key INTEGER, seller_key INTEGER
);
CREATE TABLE cleansed.stg_notes (note TEXT);

CREATE TABLE reporting.rpt_daily_sales (day TEXT, revenue REAL);
";

/// Products with a duplicate business key ("B") and a null one
const PRODUCTS: &str = "
INSERT INTO raw.products VALUES
    ('A', 'Toys', 'Kite', '2024-01-01'),
    ('B', 'Books', 'Atlas (old)', '2024-01-01'),
    ('B', 'Books', 'Atlas', '2024-03-01'),
    (' C ', 'Garden ', 'Rake', '2024-01-01'),
    (NULL, 'Toys', 'Nameless', '2024-01-01');
";

const SELLERS: &str = "
INSERT INTO raw.sellers VALUES ('S1', 'curitiba'), ('S2', 'recife');
";

/// Order items; "D" and "S3" resolve to nothing
const ORDER_ITEMS_WITH_ORPHANS: &str = "
INSERT INTO raw.order_items VALUES
    ('o1', 1, 'A', 'S1', 10.0),
    ('o1', 2, 'B', 'S2', 25.5),
    ('o2', 1, 'C', 'S1', 7.25),
    ('o3', 1, 'D', 'S2', 99.0),
    ('o4', 1, 'A', 'S3', 3.0);
";

const ORDER_ITEMS_RESOLVED: &str = "
INSERT INTO raw.order_items VALUES
    ('o1', 1, 'A', 'S1', 10.0),
    ('o1', 2, 'B', 'S2', 25.5),
    ('o2', 1, 'C', 'S1', 7.25),
    ('o3', 1, 'A', 'S2', 12.0);
";

pub fn config() -> WarehouseConfig {
    WarehouseConfig::from_yaml_str(CONFIG).expect("fixture config is valid")
}

pub fn config_with(extra: &str) -> WarehouseConfig {
    WarehouseConfig::from_yaml_str(&format!("{}{}", CONFIG, extra))
        .expect("fixture config is valid")
}

/// Warehouse with schema only
pub fn empty_warehouse() -> SqliteWarehouse {
    let wh = SqliteWarehouse::in_memory(&Layer::ALL).expect("in-memory warehouse");
    exec(&wh, SCHEMA);
    wh
}

/// Warehouse seeded with orphan fact references
pub fn warehouse() -> SqliteWarehouse {
    let wh = empty_warehouse();
    exec(&wh, PRODUCTS);
    exec(&wh, SELLERS);
    exec(&wh, ORDER_ITEMS_WITH_ORPHANS);
    wh
}

/// Warehouse whose fact references all resolve
pub fn resolved_warehouse() -> SqliteWarehouse {
    let wh = empty_warehouse();
    exec(&wh, PRODUCTS);
    exec(&wh, SELLERS);
    exec(&wh, ORDER_ITEMS_RESOLVED);
    wh
}

pub fn exec(wh: &SqliteWarehouse, sql: &str) {
    wh.with_conn(|conn| {
        conn.execute_batch(sql)?;
        Ok(())
    })
    .expect("fixture SQL runs");
}

pub fn query_i64(wh: &SqliteWarehouse, sql: &str) -> i64 {
    wh.with_conn(|conn| Ok(conn.query_row(sql, [], |row| row.get(0))?))
        .expect("fixture query runs")
}

pub fn query_strings(wh: &SqliteWarehouse, sql: &str) -> Vec<String> {
    wh.with_conn(|conn| {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    })
    .expect("fixture query runs")
}

/// Object names currently in a layer's catalog
pub async fn object_names(wh: &SqliteWarehouse, layer: Layer) -> BTreeSet<String> {
    wh.list_objects(layer)
        .await
        .expect("list objects")
        .into_iter()
        .map(|o| o.name)
        .collect()
}

pub fn ctx(environment: Environment) -> EnvironmentContext {
    let host = match environment {
        Environment::Production => "dwh-prd-01",
        Environment::Test => "dwh-uat-01",
        Environment::Development => "laptop-7",
    };
    EnvironmentContext::new(environment, host, "etl_operator")
}

pub fn service(
    config: WarehouseConfig,
    warehouse: Arc<dyn Warehouse>,
    audit: Arc<dyn AuditSink>,
) -> MaintenanceService {
    MaintenanceService::new(Arc::new(config), warehouse, audit).expect("service builds")
}

/// Service over `wh` with an in-memory audit log
pub fn service_with_log(wh: &SqliteWarehouse) -> (MaintenanceService, InMemoryAuditLog) {
    let log = InMemoryAuditLog::new();
    let service = service(config(), Arc::new(wh.clone()), Arc::new(log.clone()));
    (service, log)
}

// ═══════════════════════════════════════════════════════════════════════════
// Port fakes
// ═══════════════════════════════════════════════════════════════════════════

/// Audit sink whose writes always fail
#[derive(Debug, Default)]
pub struct FailingAuditSink;

#[async_trait]
impl AuditSink for FailingAuditSink {
    async fn append(&self, _entry: &AuditEntry) -> dwh_storage::Result<i64> {
        Err(StorageError::database("audit database is read-only"))
    }

    async fn recent(&self, _limit: usize) -> dwh_storage::Result<Vec<AuditRecord>> {
        Err(StorageError::database("audit database is read-only"))
    }
}

type FailRule = Box<dyn Fn(&MaintenanceStatement) -> Option<StorageError> + Send + Sync>;

/// Warehouse wrapper that records statements and fails or delays chosen ones
pub struct ScriptedWarehouse {
    inner: SqliteWarehouse,
    fail: Option<FailRule>,
    delay: Option<Duration>,
    executed: Mutex<Vec<MaintenanceStatement>>,
    interrupted: AtomicBool,
}

impl ScriptedWarehouse {
    pub fn new(inner: SqliteWarehouse) -> Self {
        Self {
            inner,
            fail: None,
            delay: None,
            executed: Mutex::new(Vec::new()),
            interrupted: AtomicBool::new(false),
        }
    }

    pub fn fail_when(
        mut self,
        rule: impl Fn(&MaintenanceStatement) -> Option<StorageError> + Send + Sync + 'static,
    ) -> Self {
        self.fail = Some(Box::new(rule));
        self
    }

    /// Sleep before every statement
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Statements that reached the engine, in order
    pub fn executed(&self) -> Vec<MaintenanceStatement> {
        self.executed.lock().unwrap().clone()
    }

    pub fn was_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Warehouse for ScriptedWarehouse {
    fn dialect(&self) -> &dyn Dialect {
        self.inner.dialect()
    }

    async fn layer_exists(&self, layer: Layer) -> dwh_storage::Result<bool> {
        self.inner.layer_exists(layer).await
    }

    async fn list_tables(&self, layer: Layer) -> dwh_storage::Result<Vec<String>> {
        self.inner.list_tables(layer).await
    }

    async fn list_objects(&self, layer: Layer) -> dwh_storage::Result<Vec<CatalogObject>> {
        self.inner.list_objects(layer).await
    }

    async fn table_columns(&self, table: &QualifiedName) -> dwh_storage::Result<Vec<String>> {
        self.inner.table_columns(table).await
    }

    async fn count_rows(
        &self,
        table: &QualifiedName,
        filter: Option<(&str, i64)>,
    ) -> dwh_storage::Result<u64> {
        self.inner.count_rows(table, filter).await
    }

    async fn execute(&self, statement: &MaintenanceStatement) -> dwh_storage::Result<u64> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.fail.as_ref().and_then(|rule| rule(statement)) {
            return Err(err);
        }
        self.executed.lock().unwrap().push(statement.clone());
        self.inner.execute(statement).await
    }

    fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
        self.inner.interrupt();
    }
}

/// Rule failing one statement kind on one table
pub fn fail_on(
    kind: &'static str,
    table: &'static str,
) -> impl Fn(&MaintenanceStatement) -> Option<StorageError> + Send + Sync + 'static {
    move |statement| {
        (statement.kind() == kind && statement.table().name == table)
            .then(|| StorageError::database(format!("injected failure: {} on {}", kind, table)))
    }
}
