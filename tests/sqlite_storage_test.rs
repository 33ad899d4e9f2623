// ==========================================
// CSV → SQLite 端到端测试
// ==========================================
// 测试目标: 读取 CSV、读取 config_kv 配置、标准步骤链、落库、运行报告
// ==========================================


use product_data_import::config::{config_keys, ConfigManager, ImportConfigReader};
use product_data_import::domain::{
    EntityKind, HydratedRecord, ProductAbstract, RejectionKind, RunReport,
};
use product_data_import::importer::{BatchWriter, CsvRowReader, ImportError, ImportPipeline};
use product_data_import::logging;
use product_data_import::repository::SqliteProductStorage;
use rusqlite::Connection;
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::{Builder, NamedTempFile};
use test_helpers::create_test_db;
use tokio_util::sync::CancellationToken;

const HEADER: &str = "abstract_sku,color_code,tax_set_name,category_key,category_product_order,\
new_from,new_to,attribute_key_1,value_1,name.de_DE,url.de_DE,description.de_DE,\
meta_title.de_DE,name.en_US,url.en_US,description.en_US,meta_title.en_US";

fn write_csv(lines: &[&str]) -> NamedTempFile {
    let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
    writeln!(file, "{}", HEADER).unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file
}

fn sample_csv() -> NamedTempFile {
    write_csv(&[
        r#"001,#DC2E09,Entertainment Electronics,"cameras, computers",5,,,brand,Canon,Canon IXUS 160 DE,/de/canon-ixus-160,Kompaktkamera,Titel,Canon IXUS 160,/en/canon-ixus-160,Compact camera,Title"#,
        r#"002,,Entertainment Electronics,cameras,,2030-01-01 00:00:00,2030-02-01 00:00:00,brand,Sony,Sony DE,/de/sony,,,Sony,/en/sony,,"#,
        r#"001,#FFFFFF,Entertainment Electronics,cameras,,,,,,Dup DE,/de/dup,,,Dup,/en/dup,,"#,
        r#"CONCRETE-001,,,cameras,,,,,,Concrete DE,/de/concrete,,,Concrete,/en/concrete,,"#,
        r#"003,,Entertainment Electronics,toys,,,,,,Toy DE,/de/toy,,,Toy,/en/toy,,"#,
        r#"004,,,smartphones,1,,,,,Phone DE,/de/phone,,,,,,"#,
    ])
}

async fn run_import(db_path: &str, csv_path: &std::path::Path) -> RunReport {
    let storage = Arc::new(SqliteProductStorage::new(db_path).unwrap());
    let config = ConfigManager::from_connection(storage.connection())
        .load_import_config()
        .await
        .unwrap();
    let reference = storage.load_reference_data().await.unwrap();
    let rows = CsvRowReader::new(csv_path).read_all().unwrap();

    let writer = Arc::new(BatchWriter::new(
        storage.clone(),
        config.batch_size,
        config.flush_timeout,
    ));
    let pipeline = ImportPipeline::builder()
        .product_abstract_chain(&reference)
        .config(&config)
        .writer(writer)
        .build()
        .unwrap();

    let report = pipeline.run(rows, CancellationToken::new()).await.unwrap();
    storage.save_run_report(&report).await.unwrap();
    report
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
        .unwrap()
}

#[tokio::test]
async fn test_csv_to_sqlite_end_to_end() {
    logging::init_test();

    let (_db_file, db_path) = create_test_db().unwrap();
    let csv = sample_csv();

    let report = run_import(&db_path, csv.path()).await;

    assert!(report.is_completed());
    assert_eq!(report.rows_read, 6);
    assert_eq!(report.rows_hydrated, 3);

    let kinds: Vec<(usize, RejectionKind)> = report
        .rejected
        .iter()
        .map(|r| (r.row_number, r.kind))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (3, RejectionKind::AlreadyImportedThisRun),
            (4, RejectionKind::AlreadyPersisted),
            (5, RejectionKind::CategoryKeyNotFound),
        ]
    );

    let conn = Connection::open(&db_path).unwrap();
    assert_eq!(count(&conn, "spy_product_abstract"), 3);
    // 004 只有 de_DE
    assert_eq!(count(&conn, "spy_product_abstract_localized_attributes"), 5);
    assert_eq!(count(&conn, "spy_url"), 5);
    assert_eq!(count(&conn, "spy_product_category"), 4);
    assert_eq!(report.written(EntityKind::Url), 5);

    // 第 1 行: 分类排序对齐,税组与属性
    let (tax_set, attributes, order_cameras, order_computers): (Option<i64>, String, i64, i64) = conn
        .query_row(
            r#"
            SELECT pa.fk_tax_set, pa.attributes,
                   (SELECT product_order FROM spy_product_category
                     WHERE fk_product_abstract = pa.id_product_abstract AND fk_category = 4),
                   (SELECT product_order FROM spy_product_category
                     WHERE fk_product_abstract = pa.id_product_abstract AND fk_category = 5)
            FROM spy_product_abstract pa WHERE pa.sku = '001'
            "#,
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .unwrap();
    assert_eq!(tax_set, Some(1));
    assert_eq!(attributes, r#"{"brand":"Canon"}"#);
    assert_eq!(order_cameras, 5);
    assert_eq!(order_computers, 0);

    // 有效期原样透传（NULL 表示未排期）
    let (new_from, new_to): (Option<String>, Option<String>) = conn
        .query_row(
            "SELECT new_from, new_to FROM spy_product_abstract WHERE sku = '001'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(new_from, None);
    assert_eq!(new_to, None);

    // 运行报告已持久化
    let (state, rejected): (String, i64) = conn
        .query_row(
            "SELECT state, rows_rejected FROM import_run WHERE batch_id = ?1",
            [&report.batch_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(state, "COMPLETED");
    assert_eq!(rejected, 3);
    assert_eq!(count(&conn, "import_rejection"), 3);
}

#[tokio::test]
async fn test_batch_size_from_config_kv() {
    let (_db_file, db_path) = create_test_db().unwrap();
    {
        let storage = SqliteProductStorage::new(&db_path).unwrap();
        let manager = ConfigManager::from_connection(storage.connection());
        manager.set_config_value(config_keys::BATCH_SIZE, "1").unwrap();
        assert_eq!(manager.get_batch_size().await.unwrap(), 1);
    }

    let csv = sample_csv();
    let report = run_import(&db_path, csv.path()).await;

    assert!(report.is_completed());
    assert_eq!(report.written(EntityKind::ProductAbstract), 3);
}

#[tokio::test]
async fn test_rerun_upserts_without_duplicates() {
    let (_db_file, db_path) = create_test_db().unwrap();
    let csv = sample_csv();

    let first = run_import(&db_path, csv.path()).await;
    let second = run_import(&db_path, csv.path()).await;

    assert_ne!(first.batch_id, second.batch_id);
    assert_eq!(second.rows_hydrated, 3);

    let conn = Connection::open(&db_path).unwrap();
    assert_eq!(count(&conn, "spy_product_abstract"), 3);
    assert_eq!(count(&conn, "spy_url"), 5);
    assert_eq!(count(&conn, "import_run"), 2);
}

#[tokio::test]
async fn test_flush_timeout_enforced_while_database_locked() {
    let (_db_file, db_path) = create_test_db().unwrap();
    let storage = Arc::new(SqliteProductStorage::new(&db_path).unwrap());

    // 另一个连接持有写锁,写入将在 busy_timeout 内等待
    let blocker = Connection::open(&db_path).unwrap();
    blocker.execute_batch("BEGIN IMMEDIATE").unwrap();

    let writer = BatchWriter::new(storage.clone(), 1, Duration::from_millis(100));
    let record: HydratedRecord = ProductAbstract {
        sku: "LOCKED-001".to_string(),
        color_code: None,
        fk_tax_set: None,
        attributes: "{}".to_string(),
        new_from: None,
        new_to: None,
    }
    .into();

    let started = Instant::now();
    let result = writer.add_row(vec![record]).await;
    let elapsed = started.elapsed();

    // 释放写锁,让后台写入任务结束
    blocker.execute_batch("ROLLBACK").unwrap();

    assert!(
        matches!(
            result,
            Err(ImportError::FlushTimeout {
                kind: EntityKind::ProductAbstract,
                timeout_ms: 100,
            })
        ),
        "应返回 FlushTimeout, 实际: {:?}",
        result
    );
    assert!(elapsed < Duration::from_secs(1), "超时未生效: {:?}", elapsed);
    assert_eq!(writer.written(EntityKind::ProductAbstract), 0);
}
