// ==========================================
// 商品数据导入 - 批量写入器
// ==========================================
// 职责: 跨行累积水合记录,按批次刷新到存储
// 批次边界: 以主记录数计；达到 batch_size 时整体换出全部缓冲区
// 写入顺序: 主记录 → 本地化 → 分类 → URL（从属记录不早于主记录落库）
// 并发: 追加 + 计数 + 换出在同一把锁内；实际写入在锁外进行
// ==========================================

use crate::domain::product::HydratedRecord;
use crate::domain::types::EntityKind;
use crate::importer::data_set::{DataSet, DataValue};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::keys;
use crate::repository::product_storage::ProductStorage;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

/// 默认批次大小（主记录数）
pub const DEFAULT_BATCH_SIZE: usize = 5_000;

type Buffers = [Vec<HydratedRecord>; 4];

// ==========================================
// BatchWriter
// ==========================================
pub struct BatchWriter {
    storage: Arc<dyn ProductStorage>,
    batch_size: usize,
    flush_timeout: Duration,
    buffers: Mutex<Buffers>, // 下标见 EntityKind::index
    written: [AtomicUsize; 4],
}

impl BatchWriter {
    /// 创建写入器
    ///
    /// # 参数
    /// - storage: 存储实现
    /// - batch_size: 批次大小（0 按 1 处理）
    /// - flush_timeout: 单次存储调用超时
    pub fn new(storage: Arc<dyn ProductStorage>, batch_size: usize, flush_timeout: Duration) -> Self {
        Self {
            storage,
            batch_size: batch_size.max(1),
            flush_timeout,
            buffers: Mutex::new(Default::default()),
            written: Default::default(),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// 从 DataSet 取出水合步骤派生的全部记录（主记录在前）
    pub fn take_row_records(data_set: &mut DataSet) -> ImportResult<Vec<HydratedRecord>> {
        let row = data_set.row_number();
        let mut records = Vec::new();

        let key = keys::DATA_PRODUCT_ABSTRACT_TRANSFER;
        match data_set.take(key)? {
            DataValue::ProductAbstract(record) => records.push(record.into()),
            other => return Err(unexpected(row, key, "product_abstract", &other)),
        }

        let key = keys::DATA_PRODUCT_ABSTRACT_LOCALIZED_TRANSFER;
        match data_set.take(key)? {
            DataValue::LocalizedRecords(list) => records.extend(list.into_iter().map(Into::into)),
            other => return Err(unexpected(row, key, "localized_records", &other)),
        }

        let key = keys::DATA_PRODUCT_CATEGORY_TRANSFER;
        match data_set.take(key)? {
            DataValue::CategoryRecords(list) => records.extend(list.into_iter().map(Into::into)),
            other => return Err(unexpected(row, key, "category_records", &other)),
        }

        let key = keys::DATA_PRODUCT_URL_TRANSFER;
        match data_set.take(key)? {
            DataValue::UrlRecords(list) => records.extend(list.into_iter().map(Into::into)),
            other => return Err(unexpected(row, key, "url_records", &other)),
        }

        Ok(records)
    }

    /// 缓冲单条记录
    pub async fn add(&self, record: HydratedRecord) -> ImportResult<()> {
        self.add_row(vec![record]).await
    }

    /// 缓冲一行的全部记录（原子追加,不会被批次边界拆开）
    ///
    /// # 返回
    /// - Err(Storage / FlushTimeout): 触发的刷新失败（致命）
    pub async fn add_row(&self, records: Vec<HydratedRecord>) -> ImportResult<()> {
        let swapped = {
            let mut buffers = self.lock_buffers();
            for record in records {
                buffers[record.kind().index()].push(record);
            }

            if buffers[EntityKind::ProductAbstract.index()].len() >= self.batch_size {
                Some(std::mem::take(&mut *buffers))
            } else {
                None
            }
        };

        match swapped {
            Some(buffers) => self.persist(buffers).await,
            None => Ok(()),
        }
    }

    /// 刷新当前缓冲（运行结束时调用,保证尾批不丢失）
    pub async fn flush(&self) -> ImportResult<()> {
        let buffers = std::mem::take(&mut *self.lock_buffers());
        if buffers.iter().all(Vec::is_empty) {
            return Ok(());
        }
        self.persist(buffers).await
    }

    /// 丢弃当前缓冲
    ///
    /// # 返回
    /// - 丢弃的记录数
    pub fn discard(&self) -> usize {
        let buffers = std::mem::take(&mut *self.lock_buffers());
        buffers.iter().map(Vec::len).sum()
    }

    pub fn buffered_count(&self) -> usize {
        self.lock_buffers().iter().map(Vec::len).sum()
    }

    pub fn written(&self, kind: EntityKind) -> usize {
        self.written[kind.index()].load(Ordering::SeqCst)
    }

    /// 各实体写入数快照
    pub fn written_snapshot(&self) -> BTreeMap<EntityKind, usize> {
        EntityKind::ALL
            .iter()
            .map(|kind| (*kind, self.written(*kind)))
            .collect()
    }

    // ===== 内部实现 =====

    fn lock_buffers(&self) -> std::sync::MutexGuard<'_, Buffers> {
        self.buffers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 按依赖顺序写入换出的缓冲,每类按 batch_size 拆分调用
    async fn persist(&self, buffers: Buffers) -> ImportResult<()> {
        for (kind, records) in EntityKind::ALL.into_iter().zip(buffers) {
            let mut remaining = records.into_iter();
            loop {
                let chunk: Vec<HydratedRecord> = remaining.by_ref().take(self.batch_size).collect();
                if chunk.is_empty() {
                    break;
                }
                self.persist_chunk(kind, chunk).await?;
            }
        }
        Ok(())
    }

    async fn persist_chunk(&self, kind: EntityKind, chunk: Vec<HydratedRecord>) -> ImportResult<()> {
        let size = chunk.len();
        debug!(kind = %kind, size, "开始写入批次");

        let count = tokio::time::timeout(self.flush_timeout, self.storage.persist_batch(kind, chunk))
            .await
            .map_err(|_| ImportError::FlushTimeout {
                kind,
                timeout_ms: self.flush_timeout.as_millis(),
            })??;

        let total = self.written[kind.index()].fetch_add(count, Ordering::SeqCst) + count;
        info!(kind = %kind, count, total, "批次写入完成");
        Ok(())
    }
}

fn unexpected(row: usize, key: &str, expected: &'static str, actual: &DataValue) -> ImportError {
    ImportError::UnexpectedValueType {
        row,
        key: key.to_string(),
        expected,
        actual: actual.type_name(),
    }
}
