//! Dimensional load against an in-memory SQLite warehouse

mod common;

use common::*;
use dwh_orchestration::{LoadStep, MaintenanceError};
use dwh_storage::{Environment, InMemoryAuditLog, MaintenanceStatement};
use pretty_assertions::assert_eq;
use std::sync::Arc;

#[tokio::test]
async fn test_surrogate_keys_unique_and_contiguous() {
    let wh = warehouse();
    let (service, _log) = service_with_log(&wh);

    let report = service.load_layer(&ctx(Environment::Development)).await.unwrap();

    assert_eq!(report.rows("dim_products"), Some(3));
    assert_eq!(report.rows("dim_sellers"), Some(2));

    let keys = query_strings(
        &wh,
        "SELECT CAST(product_key AS TEXT) FROM cleansed.dim_products ORDER BY product_key",
    );
    assert_eq!(keys, vec!["1", "2", "3"]);
    assert_eq!(
        query_i64(&wh, "SELECT COUNT(DISTINCT product_key) FROM cleansed.dim_products"),
        query_i64(&wh, "SELECT COUNT(*) FROM cleansed.dim_products")
    );
}

#[tokio::test]
async fn test_cardinality_matches_distinct_business_keys() {
    let wh = warehouse();
    let (service, _log) = service_with_log(&wh);

    service.load_layer(&ctx(Environment::Development)).await.unwrap();

    let distinct_source = query_i64(
        &wh,
        "SELECT COUNT(DISTINCT product_id) FROM raw.v_products WHERE product_id IS NOT NULL",
    );
    assert_eq!(
        query_i64(&wh, "SELECT COUNT(*) FROM cleansed.dim_products"),
        distinct_source
    );
    assert_eq!(
        query_strings(&wh, "SELECT product_id FROM cleansed.dim_products ORDER BY product_key"),
        vec!["A", "B", "C"]
    );
}

#[tokio::test]
async fn test_duplicate_business_key_keeps_newest_row() {
    let wh = warehouse();
    let (service, _log) = service_with_log(&wh);

    service.load_layer(&ctx(Environment::Development)).await.unwrap();

    assert_eq!(
        query_strings(
            &wh,
            "SELECT product_name FROM cleansed.dim_products WHERE product_id = 'B'"
        ),
        vec!["Atlas"]
    );
}

#[tokio::test]
async fn test_duplicate_choice_ignores_insertion_order() {
    let mut survivors = Vec::new();
    for rows in [
        "INSERT INTO raw.sellers VALUES ('S1', 'recife'), ('S1', 'curitiba');
         INSERT INTO raw.products VALUES
            ('B', 'books', 'Zeta', '2024-03-01'), ('B', 'books', 'Atlas', '2024-03-01');",
        "INSERT INTO raw.sellers VALUES ('S1', 'curitiba'), ('S1', 'recife');
         INSERT INTO raw.products VALUES
            ('B', 'books', 'Atlas', '2024-03-01'), ('B', 'books', 'Zeta', '2024-03-01');",
    ] {
        let wh = empty_warehouse();
        exec(&wh, rows);
        let (service, _log) = service_with_log(&wh);
        service.load_layer(&ctx(Environment::Development)).await.unwrap();
        survivors.push((
            query_strings(&wh, "SELECT seller_city FROM cleansed.dim_sellers"),
            query_strings(&wh, "SELECT product_name FROM cleansed.dim_products"),
        ));
    }

    // no dedupe order for sellers, a tie on updated_at for products
    assert_eq!(survivors[0], (vec!["CURITIBA".to_string()], vec!["Atlas".to_string()]));
    assert_eq!(survivors[0], survivors[1]);
}

#[tokio::test]
async fn test_null_business_key_excluded() {
    let wh = warehouse();
    let (service, _log) = service_with_log(&wh);

    service.load_layer(&ctx(Environment::Development)).await.unwrap();

    assert_eq!(
        query_i64(&wh, "SELECT COUNT(*) FROM cleansed.dim_products WHERE product_id IS NULL"),
        0
    );
    assert_eq!(
        query_i64(
            &wh,
            "SELECT COUNT(*) FROM cleansed.dim_products WHERE product_name = 'Nameless'"
        ),
        0
    );
}

#[tokio::test]
async fn test_unresolved_reference_gets_sentinel() {
    let wh = empty_warehouse();
    exec(
        &wh,
        "INSERT INTO raw.products VALUES
            ('A', 'toys', 'Kite', '2024-01-01'),
            ('B', 'books', 'Atlas', '2024-01-01'),
            ('C', 'garden', 'Rake', '2024-01-01');
         INSERT INTO raw.sellers VALUES ('S1', 'curitiba');
         INSERT INTO raw.order_items VALUES ('o1', 1, 'D', 'S1', 5.0);",
    );
    let (service, _log) = service_with_log(&wh);

    let report = service.load_layer(&ctx(Environment::Development)).await.unwrap();

    assert_eq!(
        query_strings(&wh, "SELECT product_id FROM cleansed.dim_products ORDER BY product_key"),
        vec!["A", "B", "C"]
    );
    assert_eq!(
        query_i64(&wh, "SELECT product_key FROM cleansed.fact_order_items"),
        -1
    );
    assert_eq!(
        query_i64(&wh, "SELECT seller_key FROM cleansed.fact_order_items"),
        1
    );
    assert_eq!(report.unresolved.len(), 1);
    assert_eq!(report.unresolved[0].dimension, "dim_products");
    assert_eq!(report.unresolved[0].column, "product_key");
    assert_eq!(report.unresolved[0].rows, 1);
}

#[tokio::test]
async fn test_null_natural_key_gets_sentinel() {
    let wh = empty_warehouse();
    exec(
        &wh,
        "INSERT INTO raw.products VALUES ('A', 'toys', 'Kite', '2024-01-01');
         INSERT INTO raw.sellers VALUES ('S1', 'curitiba');
         INSERT INTO raw.order_items VALUES
            ('o1', 1, 'A', 'S1', 5.0),
            ('o2', 1, NULL, 'S1', 6.0);",
    );
    let (service, _log) = service_with_log(&wh);

    let report = service.load_layer(&ctx(Environment::Development)).await.unwrap();

    assert_eq!(report.rows("fact_order_items"), Some(2));
    assert_eq!(
        query_i64(
            &wh,
            "SELECT product_key FROM cleansed.fact_order_items WHERE order_id = 'o2'"
        ),
        -1
    );
    assert_eq!(
        query_i64(
            &wh,
            "SELECT product_key FROM cleansed.fact_order_items WHERE order_id = 'o1'"
        ),
        1
    );
    assert_eq!(report.unresolved.len(), 1);
    assert_eq!(report.unresolved[0].column, "product_key");
    assert_eq!(report.unresolved[0].rows, 1);
}

#[tokio::test]
async fn test_fact_keys_never_null() {
    let wh = warehouse();
    let (service, _log) = service_with_log(&wh);

    let report = service.load_layer(&ctx(Environment::Development)).await.unwrap();

    assert_eq!(report.rows("fact_order_items"), Some(5));
    assert_eq!(
        query_i64(
            &wh,
            "SELECT COUNT(*) FROM cleansed.fact_order_items
             WHERE product_key IS NULL OR seller_key IS NULL"
        ),
        0
    );
    // 'D' and 'S3' have no dimension row
    let mut unresolved: Vec<(String, u64)> = report
        .unresolved
        .iter()
        .map(|u| (u.dimension.clone(), u.rows))
        .collect();
    unresolved.sort();
    assert_eq!(
        unresolved,
        vec![("dim_products".to_string(), 1), ("dim_sellers".to_string(), 1)]
    );
}

#[tokio::test]
async fn test_fact_row_count_matches_source() {
    let wh = resolved_warehouse();
    let (service, _log) = service_with_log(&wh);

    service.load_layer(&ctx(Environment::Development)).await.unwrap();

    let source_rows = query_i64(&wh, "SELECT COUNT(*) FROM raw.order_items");
    let joined = query_i64(
        &wh,
        "SELECT COUNT(*) FROM cleansed.fact_order_items f
         JOIN cleansed.dim_products p ON p.product_key = f.product_key
         JOIN cleansed.dim_sellers s ON s.seller_key = f.seller_key",
    );
    assert_eq!(joined, source_rows);
}

/// Loaded content with surrogate keys replaced by the business keys they stand for
fn content_snapshot(wh: &dwh_storage::SqliteWarehouse) -> (Vec<String>, Vec<String>) {
    let dimensions = query_strings(
        wh,
        "SELECT product_id || ':' || category || ':' || product_name
         FROM cleansed.dim_products ORDER BY product_id",
    );
    let facts = query_strings(
        wh,
        "SELECT f.order_id || ':' || f.order_item_id
                || ':' || COALESCE(p.product_id, 'sentinel ' || f.product_key)
                || ':' || COALESCE(s.seller_id, 'sentinel ' || f.seller_key)
         FROM cleansed.fact_order_items f
         LEFT JOIN cleansed.dim_products p ON p.product_key = f.product_key
         LEFT JOIN cleansed.dim_sellers s ON s.seller_key = f.seller_key
         ORDER BY f.order_id, f.order_item_id",
    );
    (dimensions, facts)
}

#[tokio::test]
async fn test_reload_is_deterministic() {
    let wh = warehouse();
    let (service, _log) = service_with_log(&wh);

    service.load_layer(&ctx(Environment::Development)).await.unwrap();
    let first = content_snapshot(&wh);
    service.load_layer(&ctx(Environment::Development)).await.unwrap();
    let second = content_snapshot(&wh);

    assert_eq!(first, second);
    assert_eq!(first.0.len(), 3);
    assert!(first.1.contains(&"o3:1:sentinel -1:S2".to_string()));
}

#[tokio::test]
async fn test_dimensions_load_before_facts() {
    let scripted = Arc::new(ScriptedWarehouse::new(warehouse()));
    let service = service(config(), scripted.clone(), Arc::new(InMemoryAuditLog::new()));

    service.load_layer(&ctx(Environment::Development)).await.unwrap();

    let steps: Vec<(String, String)> = scripted
        .executed()
        .iter()
        .map(|s| (s.kind().to_string(), s.table().name.clone()))
        .collect();
    let position = |kind: &str, table: &str| {
        steps
            .iter()
            .position(|(k, t)| k == kind && t == table)
            .unwrap()
    };

    let fact_truncate = position("truncate", "fact_order_items");
    assert!(position("load_dimension", "dim_products") < fact_truncate);
    assert!(position("load_dimension", "dim_sellers") < fact_truncate);
    assert!(fact_truncate < position("load_facts", "fact_order_items"));
}

#[tokio::test]
async fn test_insert_failure_names_table_and_step() {
    let wh = warehouse();
    {
        let (service, _log) = service_with_log(&wh);
        service.load_layer(&ctx(Environment::Development)).await.unwrap();
    }

    let scripted = Arc::new(
        ScriptedWarehouse::new(wh.clone()).fail_when(fail_on("load_facts", "fact_order_items")),
    );
    let log = InMemoryAuditLog::new();
    let service = service(config(), scripted, Arc::new(log.clone()));

    let err = service
        .load_layer(&ctx(Environment::Development))
        .await
        .unwrap_err();

    match &err {
        MaintenanceError::Load { table, step, .. } => {
            assert_eq!(table.name, "fact_order_items");
            assert_eq!(*step, LoadStep::Insert);
        }
        other => panic!("expected load error, got {:?}", other),
    }

    // Dimensions stay loaded, the fact was truncated before its insert failed
    assert_eq!(query_i64(&wh, "SELECT COUNT(*) FROM cleansed.dim_products"), 3);
    assert_eq!(query_i64(&wh, "SELECT COUNT(*) FROM cleansed.dim_sellers"), 2);
    assert_eq!(query_i64(&wh, "SELECT COUNT(*) FROM cleansed.fact_order_items"), 0);

    let entries = log.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].outcome, dwh_storage::AuditOutcome::Failed);
    assert!(entries[0].detail.contains("fact_order_items"));
}

#[tokio::test]
async fn test_truncate_failure_stops_before_later_tables() {
    let wh = warehouse();
    let scripted = Arc::new(
        ScriptedWarehouse::new(wh.clone()).fail_when(fail_on("truncate", "dim_sellers")),
    );
    let service = service(config(), scripted.clone(), Arc::new(InMemoryAuditLog::new()));

    let err = service
        .load_layer(&ctx(Environment::Development))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        MaintenanceError::Load { step: LoadStep::Truncate, ref table, .. } if table.name == "dim_sellers"
    ));
    assert_eq!(query_i64(&wh, "SELECT COUNT(*) FROM cleansed.dim_products"), 3);
    assert!(scripted
        .executed()
        .iter()
        .all(|s| !matches!(s, MaintenanceStatement::LoadFacts(_))));
}
