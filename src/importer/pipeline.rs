// ==========================================
// 商品数据导入 - 导入管道
// ==========================================
// 职责: 逐行驱动步骤链,按失败策略处理被拒行,交给写入器落库
// 流程: 读取行 → 步骤链水合 → 写入器缓冲 → 批次刷新 → 运行报告
// 状态机:
// - 行: Pending → Hydrating → {Hydrated | Rejected}
// - 运行: Idle → Running → {Completed | Aborted}（单次使用）
// 并发: parallelism > 1 时按块在阻塞线程池水合,结果按输入顺序写入
// ==========================================

use crate::config::ImportConfig;
use crate::domain::report::{RejectedRow, RejectionKind, RowState, RunReport, RunState};
use crate::domain::types::{AbortBufferPolicy, FailurePolicy};
use crate::importer::data_set::DataSet;
use crate::importer::dedup_registry::DedupRegistry;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::extractor_steps::{
    AddCategoryKeysStep, AddLocalesStep, AttributesExtractorStep,
    LocalizedAttributesExtractorStep, TaxSetNameToIdStep,
};
use crate::importer::hydrator_step::ProductAbstractHydratorStep;
use crate::importer::import_step_trait::ImportStep;
use crate::importer::keys;
use crate::importer::writer::BatchWriter;
use crate::repository::product_storage::ReferenceData;
use futures::future::join_all;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// 取消运行时记录的中止原因
pub const CANCELLED_REASON: &str = "cancelled";

/// 抽象商品导入的标准步骤链
///
/// # 参数
/// - reference: 运行前加载的参考数据
/// - registry: 去重注册表（与管道共享）
pub fn product_abstract_steps(
    reference: &ReferenceData,
    registry: Arc<DedupRegistry>,
) -> Vec<Arc<dyn ImportStep>> {
    vec![
        Arc::new(AddLocalesStep::new(Arc::new(reference.locales.clone()))),
        Arc::new(AddCategoryKeysStep::new(Arc::new(
            reference.category_keys.clone(),
        ))),
        Arc::new(TaxSetNameToIdStep::new(Arc::new(reference.tax_sets.clone()))),
        Arc::new(AttributesExtractorStep),
        Arc::new(LocalizedAttributesExtractorStep),
        Arc::new(ProductAbstractHydratorStep::new(registry)),
    ]
}

// ==========================================
// RowOutcome - 单行水合结果
// ==========================================
struct RowOutcome {
    data_set: DataSet,
    state: RowState,
    error: Option<ImportError>,
}

/// 按顺序执行步骤链（首个失败即终止该行）
fn hydrate_row(steps: &[Arc<dyn ImportStep>], mut data_set: DataSet) -> ImportResult<RowOutcome> {
    let state = RowState::Pending.transition(RowState::Hydrating)?;

    for step in steps {
        if let Err(e) = step.execute(&mut data_set) {
            debug!(
                row = data_set.row_number(),
                step = step.name(),
                error = %e,
                "步骤执行失败"
            );
            return Ok(RowOutcome {
                data_set,
                state: state.transition(RowState::Rejected)?,
                error: Some(e),
            });
        }
    }

    Ok(RowOutcome {
        data_set,
        state: state.transition(RowState::Hydrated)?,
        error: None,
    })
}

// ==========================================
// ImportPipeline
// ==========================================
pub struct ImportPipeline {
    steps: Arc<[Arc<dyn ImportStep>]>,
    registry: Arc<DedupRegistry>,
    writer: Arc<BatchWriter>,
    policy: FailurePolicy,
    parallelism: usize,
    abort_buffer_policy: AbortBufferPolicy,
    state: Mutex<RunState>,
}

impl ImportPipeline {
    pub fn builder() -> ImportPipelineBuilder {
        ImportPipelineBuilder::default()
    }

    pub fn state(&self) -> RunState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn registry(&self) -> &Arc<DedupRegistry> {
        &self.registry
    }

    pub fn writer(&self) -> &Arc<BatchWriter> {
        &self.writer
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|step| step.name()).collect()
    }

    /// 执行一次导入运行
    ///
    /// # 参数
    /// - rows: 输入行（按顺序）
    /// - cancel: 取消令牌（取消后不再调度新行）
    ///
    /// # 返回
    /// - Ok(RunReport): 运行结束（Completed,或按策略中止的 Aborted）
    /// - Err: 致命错误（存储失败 / 刷新超时 / 重复运行）
    #[instrument(skip(self, rows, cancel), fields(batch_id))]
    pub async fn run<I>(&self, rows: I, cancel: CancellationToken) -> ImportResult<RunReport>
    where
        I: IntoIterator<Item = DataSet>,
        I::IntoIter: Send,
    {
        self.begin()?;

        let start_time = Instant::now();
        let mut report = RunReport::new(Uuid::new_v4().to_string(), self.policy);
        tracing::Span::current().record("batch_id", report.batch_id.as_str());
        report.transition(RunState::Running)?;

        info!(
            batch_id = %report.batch_id,
            policy = %self.policy,
            parallelism = self.parallelism,
            batch_size = self.writer.batch_size(),
            seeded_skus = self.registry.seeded_count(),
            "开始导入抽象商品"
        );

        let result = match self.drive(rows.into_iter(), &cancel, &mut report).await {
            Ok(None) => self.complete(&mut report).await,
            Ok(Some(reason)) => self.abort(&mut report, reason).await,
            Err(e) => Err(e),
        };

        report.records_written = self.writer.written_snapshot();
        report.elapsed_ms = start_time.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                self.set_state(report.state);
                info!(
                    batch_id = %report.batch_id,
                    state = %report.state,
                    rows_read = report.rows_read,
                    rows_hydrated = report.rows_hydrated,
                    rows_rejected = report.rows_rejected(),
                    elapsed_ms = report.elapsed_ms,
                    "导入运行结束"
                );
                Ok(report)
            }
            Err(e) => {
                self.set_state(RunState::Aborted);
                error!(batch_id = %report.batch_id, error = %e, "导入运行失败");
                Err(e)
            }
        }
    }

    // ===== 内部实现 =====

    fn begin(&self) -> ImportResult<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = state.transition(RunState::Running)?;
        Ok(())
    }

    fn set_state(&self, next: RunState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }

    /// 主循环
    ///
    /// # 返回
    /// - Ok(None): 全部行处理完毕
    /// - Ok(Some(reason)): 需中止（快速失败 / 取消）
    async fn drive<I>(
        &self,
        mut rows: I,
        cancel: &CancellationToken,
        report: &mut RunReport,
    ) -> ImportResult<Option<String>>
    where
        I: Iterator<Item = DataSet> + Send,
    {
        loop {
            if cancel.is_cancelled() {
                info!(rows_read = report.rows_read, "运行已取消，停止调度新行");
                return Ok(Some(CANCELLED_REASON.to_string()));
            }

            let chunk: Vec<DataSet> = rows.by_ref().take(self.parallelism).collect();
            if chunk.is_empty() {
                return Ok(None);
            }

            // rows_read 只计入已处理的结果,保证 read = hydrated + rejected
            let outcomes = self.hydrate_chunk(chunk).await?;
            let total = outcomes.len();
            for (idx, outcome) in outcomes.into_iter().enumerate() {
                report.rows_read += 1;
                if let Some(reason) = self.accept(outcome, report).await? {
                    let skipped = total - idx - 1;
                    if skipped > 0 {
                        info!(skipped, "中止: 同块内后续行已水合但不再写入");
                    }
                    return Ok(Some(reason));
                }
            }
        }
    }

    /// 水合一块行（结果保持输入顺序）
    async fn hydrate_chunk(&self, chunk: Vec<DataSet>) -> ImportResult<Vec<RowOutcome>> {
        if self.parallelism <= 1 {
            return chunk
                .into_iter()
                .map(|data_set| hydrate_row(&self.steps, data_set))
                .collect();
        }

        let tasks = chunk.into_iter().map(|data_set| {
            let steps = Arc::clone(&self.steps);
            tokio::task::spawn_blocking(move || hydrate_row(&steps, data_set))
        });

        join_all(tasks)
            .await
            .into_iter()
            .map(|joined| -> ImportResult<RowOutcome> {
                joined.map_err(|e| ImportError::InternalError(format!("水合任务失败: {}", e)))?
            })
            .collect()
    }

    /// 处理单行结果
    ///
    /// # 返回
    /// - Ok(Some(reason)): 快速失败策略下需中止
    async fn accept(
        &self,
        outcome: RowOutcome,
        report: &mut RunReport,
    ) -> ImportResult<Option<String>> {
        let RowOutcome {
            mut data_set,
            state,
            error,
        } = outcome;
        let row = data_set.row_number();

        let e = match error {
            None => {
                let records = BatchWriter::take_row_records(&mut data_set)?;
                debug!(row, state = %state, records = records.len(), "行水合完成");
                self.writer.add_row(records).await?;
                report.rows_hydrated += 1;
                return Ok(None);
            }
            Some(e) if e.is_row_scoped() => e,
            Some(e) => return Err(e),
        };

        let rejected = RejectedRow {
            row_number: row,
            abstract_sku: data_set
                .get_str(keys::ABSTRACT_SKU)
                .ok()
                .map(str::to_string),
            kind: e.rejection_kind().unwrap_or(RejectionKind::InvalidValue),
            reason: e.to_string(),
        };
        warn!(
            row,
            sku = ?rejected.abstract_sku,
            kind = %rejected.kind,
            state = %state,
            reason = %rejected.reason,
            "行被拒绝"
        );
        report.rejected.push(rejected);

        match self.policy {
            FailurePolicy::FailFast => Ok(Some(format!("行 {} 被拒绝: {}", row, e))),
            FailurePolicy::CollectAndContinue => Ok(None),
        }
    }

    /// 正常结束: 刷新尾批
    async fn complete(&self, report: &mut RunReport) -> ImportResult<()> {
        self.writer.flush().await?;
        report.transition(RunState::Completed)
    }

    /// 中止: 按缓冲策略刷新或丢弃
    async fn abort(&self, report: &mut RunReport, reason: String) -> ImportResult<()> {
        match self.abort_buffer_policy {
            AbortBufferPolicy::Flush => self.writer.flush().await?,
            AbortBufferPolicy::Discard => {
                report.records_discarded = self.writer.discard();
            }
        }

        warn!(
            reason = %reason,
            buffer_policy = %self.abort_buffer_policy,
            records_discarded = report.records_discarded,
            "导入运行中止"
        );
        report.abort_reason = Some(reason);
        report.transition(RunState::Aborted)
    }
}

// ==========================================
// ImportPipelineBuilder
// ==========================================
#[derive(Default)]
pub struct ImportPipelineBuilder {
    steps: Vec<Arc<dyn ImportStep>>,
    registry: Option<Arc<DedupRegistry>>,
    writer: Option<Arc<BatchWriter>>,
    policy: Option<FailurePolicy>,
    parallelism: Option<usize>,
    abort_buffer_policy: Option<AbortBufferPolicy>,
}

impl ImportPipelineBuilder {
    pub fn add_step(mut self, step: Arc<dyn ImportStep>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn steps(mut self, steps: impl IntoIterator<Item = Arc<dyn ImportStep>>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// 使用参考数据装配标准步骤链,并以已持久化 SKU 初始化去重注册表
    pub fn product_abstract_chain(mut self, reference: &ReferenceData) -> Self {
        let registry = Arc::new(DedupRegistry::seeded(
            reference.existing_concrete_skus.iter().cloned(),
        ));
        self.steps
            .extend(product_abstract_steps(reference, Arc::clone(&registry)));
        self.registry = Some(registry);
        self
    }

    pub fn registry(mut self, registry: Arc<DedupRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn writer(mut self, writer: Arc<BatchWriter>) -> Self {
        self.writer = Some(writer);
        self
    }

    pub fn policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = Some(parallelism);
        self
    }

    pub fn abort_buffer_policy(mut self, policy: AbortBufferPolicy) -> Self {
        self.abort_buffer_policy = Some(policy);
        self
    }

    /// 从导入配置设置策略与并行度
    pub fn config(self, config: &ImportConfig) -> Self {
        self.policy(config.failure_policy)
            .parallelism(config.parallelism)
            .abort_buffer_policy(config.abort_buffer_policy)
    }

    pub fn build(self) -> ImportResult<ImportPipeline> {
        let writer = self
            .writer
            .ok_or_else(|| ImportError::InternalError("导入管道未配置写入器".to_string()))?;
        if self.steps.is_empty() {
            return Err(ImportError::InternalError(
                "导入管道未配置任何步骤".to_string(),
            ));
        }

        let defaults = ImportConfig::default();
        Ok(ImportPipeline {
            steps: Arc::from(self.steps),
            registry: self.registry.unwrap_or_default(),
            writer,
            policy: self.policy.unwrap_or(defaults.failure_policy),
            parallelism: self.parallelism.unwrap_or(defaults.parallelism).max(1),
            abort_buffer_policy: self
                .abort_buffer_policy
                .unwrap_or(defaults.abort_buffer_policy),
            state: Mutex::new(RunState::Idle),
        })
    }
}
