// ==========================================
// 商品数据导入 - SQLite 商品存储实现
// ==========================================
// 职责: 批量写入水合记录、加载参考数据、保存运行报告
// 约定:
// - 每次 persist_batch 一个事务,失败整体回滚
// - 主记录按 SKU UPSERT；从属记录在同一事务内由 SKU 解析内部 ID
// 红线: 存储层不含业务规则,只做数据读写
// ==========================================

use crate::db::{ensure_schema, open_sqlite_connection};
use crate::domain::product::{
    HydratedRecord, ProductAbstract, ProductAbstractLocalizedAttributes, ProductCategory,
    ProductUrl,
};
use crate::domain::report::RunReport;
use crate::domain::types::EntityKind;
use crate::repository::error::{StorageError, StorageResult};
use crate::repository::product_storage::{ProductStorage, ReferenceData};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

// ==========================================
// SqliteProductStorage
// ==========================================
pub struct SqliteProductStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteProductStorage {
    /// 打开数据库并确保表结构存在
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> StorageResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| StorageError::DatabaseConnectionError(e.to_string()))?;
        ensure_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建（调用方负责建表）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 共享连接（供 ConfigManager 复用）
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    /// 在阻塞线程池中持锁执行数据库操作
    ///
    /// 说明：rusqlite 调用（含 busy_timeout 等待）同步阻塞,统一在 spawn_blocking 中执行
    async fn with_connection<T, F>(&self, op: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> StorageResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| StorageError::LockError(e.to_string()))?;
            op(&conn)
        })
        .await
        .map_err(|e| StorageError::InternalError(format!("数据库任务执行失败: {}", e)))?
    }

    // ===== 参考数据 =====

    /// 加载运行前参考数据
    ///
    /// # 返回
    /// - locales / category_keys / tax_sets: 名称 → ID
    /// - existing_concrete_skus: 已持久化具体商品 SKU（去重种子）
    pub async fn load_reference_data(&self) -> StorageResult<ReferenceData> {
        let reference = self.with_connection(Self::load_reference_data_blocking).await?;

        info!(
            locales = reference.locales.len(),
            categories = reference.category_keys.len(),
            tax_sets = reference.tax_sets.len(),
            concrete_skus = reference.existing_concrete_skus.len(),
            "参考数据加载完成"
        );
        Ok(reference)
    }

    fn load_reference_data_blocking(conn: &Connection) -> StorageResult<ReferenceData> {
        Ok(ReferenceData {
            locales: Self::load_key_map(
                conn,
                "SELECT locale_name, id_locale FROM spy_locale ORDER BY id_locale",
            )?,
            category_keys: Self::load_key_map(
                conn,
                "SELECT category_key, id_category FROM spy_category",
            )?,
            tax_sets: Self::load_key_map(conn, "SELECT name, id_tax_set FROM spy_tax_set")?,
            existing_concrete_skus: {
                let mut stmt = conn.prepare("SELECT sku FROM spy_product")?;
                let skus = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                skus
            },
        })
    }

    fn load_key_map(conn: &Connection, sql: &str) -> StorageResult<HashMap<String, i64>> {
        let mut stmt = conn.prepare(sql)?;
        let map = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(map)
    }

    // ===== 运行报告 =====

    /// 保存运行报告及全部被拒行（同一批次重复保存时覆盖）
    pub async fn save_run_report(&self, report: &RunReport) -> StorageResult<()> {
        let report = report.clone();
        self.with_connection(move |conn| Self::save_run_report_blocking(conn, &report))
            .await
    }

    fn save_run_report_blocking(conn: &Connection, report: &RunReport) -> StorageResult<()> {
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            "DELETE FROM import_rejection WHERE batch_id = ?1",
            params![report.batch_id],
        )?;
        tx.execute(
            r#"
            INSERT OR REPLACE INTO import_run (
                batch_id, state, policy, started_at, finished_at,
                rows_read, rows_hydrated, rows_rejected, records_written,
                records_discarded, abort_reason, elapsed_ms
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                report.batch_id,
                report.state.to_string(),
                report.policy.to_string(),
                report.started_at.to_rfc3339(),
                report.finished_at.map(|t| t.to_rfc3339()),
                report.rows_read as i64,
                report.rows_hydrated as i64,
                report.rows_rejected() as i64,
                serde_json::to_string(&report.records_written)?,
                report.records_discarded as i64,
                report.abort_reason,
                report.elapsed_ms as i64,
            ],
        )?;

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO import_rejection (batch_id, row_number, abstract_sku, kind, reason)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )?;
            for rejected in &report.rejected {
                stmt.execute(params![
                    report.batch_id,
                    rejected.row_number as i64,
                    rejected.abstract_sku,
                    rejected.kind.to_string(),
                    rejected.reason,
                ])?;
            }
        }

        tx.commit()?;
        debug!(batch_id = %report.batch_id, rejected = report.rows_rejected(), "运行报告已保存");
        Ok(())
    }

    /// 单事务写入一批同类记录
    fn persist_batch_blocking(
        conn: &Connection,
        kind: EntityKind,
        records: Vec<HydratedRecord>,
    ) -> StorageResult<usize> {
        let tx = conn.unchecked_transaction()?;

        let count = match kind {
            EntityKind::ProductAbstract => {
                let batch = unwrap_batch(kind, records, |r| match r {
                    HydratedRecord::ProductAbstract(p) => Ok(p),
                    other => Err(other),
                })?;
                Self::upsert_product_abstract_tx(&tx, &batch)?
            }
            EntityKind::ProductAbstractLocalizedAttributes => {
                let batch = unwrap_batch(kind, records, |r| match r {
                    HydratedRecord::LocalizedAttributes(l) => Ok(l),
                    other => Err(other),
                })?;
                Self::upsert_localized_attributes_tx(&tx, &batch)?
            }
            EntityKind::ProductCategory => {
                let batch = unwrap_batch(kind, records, |r| match r {
                    HydratedRecord::Category(c) => Ok(c),
                    other => Err(other),
                })?;
                Self::upsert_product_category_tx(&tx, &batch)?
            }
            EntityKind::Url => {
                let batch = unwrap_batch(kind, records, |r| match r {
                    HydratedRecord::Url(u) => Ok(u),
                    other => Err(other),
                })?;
                Self::upsert_url_tx(&tx, &batch)?
            }
        };

        tx.commit()?;
        debug!(table = kind.table_name(), count, "批次已提交");
        Ok(count)
    }

    // ===== 事务内写入 =====

    /// 由 SKU 解析抽象商品内部 ID
    fn resolve_abstract_id(tx: &Transaction, sku: &str) -> StorageResult<i64> {
        tx.query_row(
            "SELECT id_product_abstract FROM spy_product_abstract WHERE sku = ?1",
            params![sku],
            |row| row.get::<_, i64>(0),
        )
        .optional()?
        .ok_or_else(|| StorageError::PrimaryRecordMissing {
            sku: sku.to_string(),
        })
    }

    fn upsert_product_abstract_tx(tx: &Transaction, records: &[ProductAbstract]) -> StorageResult<usize> {
        let updated_at = Utc::now().to_rfc3339();
        let mut stmt = tx.prepare(
            r#"
            INSERT INTO spy_product_abstract (
                sku, color_code, fk_tax_set, attributes, new_from, new_to, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(sku) DO UPDATE SET
                color_code = excluded.color_code,
                fk_tax_set = excluded.fk_tax_set,
                attributes = excluded.attributes,
                new_from = excluded.new_from,
                new_to = excluded.new_to,
                updated_at = excluded.updated_at
            "#,
        )?;

        let mut count = 0;
        for record in records {
            stmt.execute(params![
                record.sku,
                record.color_code,
                record.fk_tax_set,
                record.attributes,
                record.new_from,
                record.new_to,
                updated_at,
            ])?;
            count += 1;
        }
        Ok(count)
    }

    fn upsert_localized_attributes_tx(
        tx: &Transaction,
        records: &[ProductAbstractLocalizedAttributes],
    ) -> StorageResult<usize> {
        let mut stmt = tx.prepare(
            r#"
            INSERT INTO spy_product_abstract_localized_attributes (
                fk_product_abstract, fk_locale, name, description,
                meta_title, meta_description, meta_keywords, attributes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(fk_product_abstract, fk_locale) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                meta_title = excluded.meta_title,
                meta_description = excluded.meta_description,
                meta_keywords = excluded.meta_keywords,
                attributes = excluded.attributes
            "#,
        )?;

        let mut count = 0;
        for record in records {
            let id_product_abstract = Self::resolve_abstract_id(tx, &record.abstract_sku)?;
            stmt.execute(params![
                id_product_abstract,
                record.fk_locale,
                record.name,
                record.description,
                record.meta_title,
                record.meta_description,
                record.meta_keywords,
                record.attributes,
            ])?;
            count += 1;
        }
        Ok(count)
    }

    fn upsert_product_category_tx(tx: &Transaction, records: &[ProductCategory]) -> StorageResult<usize> {
        let mut stmt = tx.prepare(
            r#"
            INSERT INTO spy_product_category (fk_product_abstract, fk_category, product_order)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(fk_product_abstract, fk_category) DO UPDATE SET
                product_order = excluded.product_order
            "#,
        )?;

        let mut count = 0;
        for record in records {
            let id_product_abstract = Self::resolve_abstract_id(tx, &record.abstract_sku)?;
            stmt.execute(params![id_product_abstract, record.fk_category, record.product_order])?;
            count += 1;
        }
        Ok(count)
    }

    fn upsert_url_tx(tx: &Transaction, records: &[ProductUrl]) -> StorageResult<usize> {
        let mut stmt = tx.prepare(
            r#"
            INSERT INTO spy_url (fk_product_abstract, fk_locale, url)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(fk_product_abstract, fk_locale) DO UPDATE SET
                url = excluded.url
            "#,
        )?;

        let mut count = 0;
        for record in records {
            let id_product_abstract = Self::resolve_abstract_id(tx, &record.abstract_sku)?;
            stmt.execute(params![id_product_abstract, record.fk_locale, record.url])?;
            count += 1;
        }
        Ok(count)
    }
}

/// 校验批次类型一致并拆出具体记录
fn unwrap_batch<T>(
    kind: EntityKind,
    records: Vec<HydratedRecord>,
    extract: impl Fn(HydratedRecord) -> Result<T, HydratedRecord>,
) -> StorageResult<Vec<T>> {
    records
        .into_iter()
        .map(|record| {
            extract(record).map_err(|other| StorageError::MixedBatch {
                expected: kind.to_string(),
                actual: other.kind().to_string(),
            })
        })
        .collect()
}

#[async_trait]
impl ProductStorage for SqliteProductStorage {
    /// 批量写入同类记录（事务化）
    async fn persist_batch(
        &self,
        kind: EntityKind,
        records: Vec<HydratedRecord>,
    ) -> StorageResult<usize> {
        self.with_connection(move |conn| Self::persist_batch_blocking(conn, kind, records))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::FailurePolicy;

    fn storage() -> SqliteProductStorage {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        ensure_schema(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO spy_locale (id_locale, locale_name) VALUES (46, 'de_DE'), (66, 'en_US');
             INSERT INTO spy_category (id_category, category_key) VALUES (4, 'cameras');
             INSERT INTO spy_tax_set (id_tax_set, name) VALUES (1, 'Standard');
             INSERT INTO spy_product (sku) VALUES ('001_25904006');",
        )
        .unwrap();
        SqliteProductStorage::from_connection(Arc::new(Mutex::new(conn)))
    }

    fn product_abstract(sku: &str, color: &str) -> HydratedRecord {
        ProductAbstract {
            sku: sku.to_string(),
            color_code: Some(color.to_string()),
            fk_tax_set: Some(1),
            attributes: "{}".to_string(),
            new_from: None,
            new_to: None,
        }
        .into()
    }

    #[tokio::test]
    async fn test_load_reference_data() {
        let reference = storage().load_reference_data().await.unwrap();

        assert_eq!(reference.locales.get("en_US"), Some(&66));
        assert_eq!(reference.category_keys.get("cameras"), Some(&4));
        assert_eq!(reference.tax_sets.get("Standard"), Some(&1));
        assert_eq!(reference.existing_concrete_skus, vec!["001_25904006"]);
    }

    #[tokio::test]
    async fn test_primary_upsert_by_sku() {
        let storage = storage();

        storage
            .persist_batch(EntityKind::ProductAbstract, vec![product_abstract("001", "#FF0000")])
            .await
            .unwrap();
        storage
            .persist_batch(EntityKind::ProductAbstract, vec![product_abstract("001", "#00FF00")])
            .await
            .unwrap();

        let conn = storage.connection();
        let conn = conn.lock().unwrap();
        let (count, color): (i64, String) = conn
            .query_row(
                "SELECT COUNT(*), MAX(color_code) FROM spy_product_abstract",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(color, "#00FF00");
    }

    #[tokio::test]
    async fn test_dependent_resolves_abstract_id() {
        let storage = storage();
        storage
            .persist_batch(EntityKind::ProductAbstract, vec![product_abstract("001", "#FF0000")])
            .await
            .unwrap();

        let written = storage
            .persist_batch(
                EntityKind::ProductCategory,
                vec![ProductCategory {
                    abstract_sku: "001".to_string(),
                    category_key: "cameras".to_string(),
                    fk_category: 4,
                    product_order: 3,
                }
                .into()],
            )
            .await
            .unwrap();
        assert_eq!(written, 1);

        let conn = storage.connection();
        let conn = conn.lock().unwrap();
        let sku: String = conn
            .query_row(
                "SELECT pa.sku FROM spy_product_category pc
                 JOIN spy_product_abstract pa ON pa.id_product_abstract = pc.fk_product_abstract
                 WHERE pc.product_order = 3",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(sku, "001");
    }

    #[tokio::test]
    async fn test_dependent_without_primary_rolls_back() {
        let storage = storage();

        let result = storage
            .persist_batch(
                EntityKind::Url,
                vec![ProductUrl {
                    abstract_sku: "missing".to_string(),
                    fk_locale: 46,
                    url: "/de/missing".to_string(),
                }
                .into()],
            )
            .await;

        assert!(matches!(result, Err(StorageError::PrimaryRecordMissing { sku }) if sku == "missing"));
    }

    #[tokio::test]
    async fn test_mixed_batch_rejected() {
        let storage = storage();

        let result = storage
            .persist_batch(EntityKind::Url, vec![product_abstract("001", "#FF0000")])
            .await;

        assert!(matches!(result, Err(StorageError::MixedBatch { .. })));
    }

    #[tokio::test]
    async fn test_save_run_report_with_rejections() {
        use crate::domain::report::{RejectedRow, RejectionKind, RunState};

        let storage = storage();
        let mut report = RunReport::new("batch-1", FailurePolicy::CollectAndContinue);
        report.transition(RunState::Running).unwrap();
        report.rows_read = 2;
        report.rows_hydrated = 1;
        report.rejected.push(RejectedRow {
            row_number: 2,
            abstract_sku: Some("001".to_string()),
            kind: RejectionKind::AlreadyImportedThisRun,
            reason: "duplicate".to_string(),
        });
        report.transition(RunState::Completed).unwrap();

        storage.save_run_report(&report).await.unwrap();
        storage.save_run_report(&report).await.unwrap();

        let conn = storage.connection();
        let conn = conn.lock().unwrap();
        let (state, rejected): (String, i64) = conn
            .query_row(
                "SELECT state, rows_rejected FROM import_run WHERE batch_id = 'batch-1'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(state, "COMPLETED");
        assert_eq!(rejected, 1);

        let kinds: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM import_rejection WHERE kind = 'ALREADY_IMPORTED_THIS_RUN'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(kinds, 1);
    }
}
