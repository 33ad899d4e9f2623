// ==========================================
// ImportPipeline 集成测试
// ==========================================
// 测试目标: 失败策略、批次边界、致命错误、取消、并行水合
// ==========================================


use product_data_import::config::ImportConfig;
use product_data_import::domain::{
    AbortBufferPolicy, EntityKind, FailurePolicy, HydratedRecord, RejectionKind, RunState,
};
use product_data_import::importer::{
    BatchWriter, DataSet, ImportError, ImportPipeline, ImportResult, ImportStep,
};
use product_data_import::logging;
use std::sync::Arc;
use std::time::Duration;
use test_helpers::{
    build_pipeline, product_row, product_rows, reference_data, test_config, FailingStorage,
    RecordingStorage, SlowStorage,
};
use tokio_util::sync::CancellationToken;

/// 处理到指定行后触发取消
struct CancelAfterRow {
    row_number: usize,
    token: CancellationToken,
}

impl ImportStep for CancelAfterRow {
    fn name(&self) -> &'static str {
        "CancelAfterRow"
    }

    fn execute(&self, data_set: &mut DataSet) -> ImportResult<()> {
        if data_set.row_number() == self.row_number {
            self.token.cancel();
        }
        Ok(())
    }
}

fn cancelling_pipeline(
    storage: Arc<RecordingStorage>,
    policy: AbortBufferPolicy,
    cancel_after: usize,
    token: CancellationToken,
) -> ImportPipeline {
    let writer = Arc::new(BatchWriter::new(storage, 100, Duration::from_secs(5)));
    ImportPipeline::builder()
        .product_abstract_chain(&reference_data())
        .add_step(Arc::new(CancelAfterRow {
            row_number: cancel_after,
            token,
        }))
        .abort_buffer_policy(policy)
        .writer(writer)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_collect_and_continue_reports_invalid_rows() {
    logging::init_test();

    let storage = Arc::new(RecordingStorage::default());
    let pipeline = build_pipeline(storage.clone(), &test_config(100));

    // 第 3 行: 与第 1 行 SKU 重复；第 7 行: 未知分类键
    let mut rows = product_rows(10);
    rows[2] = product_row(3, "SKU-001", "cameras", "");
    rows[6] = product_row(7, "SKU-007", "cameras, toys", "1,2");

    let report = pipeline.run(rows, CancellationToken::new()).await.unwrap();

    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.rows_read, 10);
    assert_eq!(report.rows_hydrated, 8);
    assert_eq!(report.rows_rejected(), 2);

    assert_eq!(report.rejected[0].row_number, 3);
    assert_eq!(report.rejected[0].abstract_sku.as_deref(), Some("SKU-001"));
    assert_eq!(report.rejected[0].kind, RejectionKind::AlreadyImportedThisRun);
    assert_eq!(report.rejected[1].row_number, 7);
    assert_eq!(report.rejected[1].kind, RejectionKind::CategoryKeyNotFound);
    assert!(report.rejected[1].reason.contains("\"toys\""));

    // 只有 8 个有效行的记录到达存储
    let skus = storage.abstract_skus();
    assert_eq!(skus.len(), 8);
    assert!(!skus.contains(&"SKU-007".to_string()));
    assert_eq!(report.written(EntityKind::ProductAbstract), 8);
    assert_eq!(report.written(EntityKind::ProductAbstractLocalizedAttributes), 16);
    assert_eq!(report.written(EntityKind::ProductCategory), 8);
    assert_eq!(report.written(EntityKind::Url), 16);
}

#[tokio::test]
async fn test_tail_batch_is_flushed() {
    let storage = Arc::new(RecordingStorage::default());
    let pipeline = build_pipeline(storage.clone(), &test_config(3));

    let report = pipeline
        .run(product_rows(7), CancellationToken::new())
        .await
        .unwrap();

    assert!(report.is_completed());
    // ceil(7 / 3) = 3 次主记录写入
    assert_eq!(storage.call_sizes(EntityKind::ProductAbstract), vec![3, 3, 1]);
    assert_eq!(report.written(EntityKind::ProductAbstract), 7);
}

#[tokio::test]
async fn test_dependents_never_precede_primary() {
    let storage = Arc::new(RecordingStorage::default());
    let pipeline = build_pipeline(storage.clone(), &test_config(2));

    pipeline
        .run(product_rows(5), CancellationToken::new())
        .await
        .unwrap();

    let mut seen_primary = Vec::new();
    for kind in storage.kinds_in_order() {
        if kind == EntityKind::ProductAbstract {
            seen_primary.push(kind);
        } else {
            assert!(!seen_primary.is_empty(), "从属记录先于主记录写入");
        }
    }

    // 每条 URL 记录的主记录都已写入
    let primary = storage.abstract_skus();
    for url in storage.records(EntityKind::Url) {
        assert!(primary.contains(&url.abstract_sku().to_string()));
    }
}

#[tokio::test]
async fn test_ordinal_alignment_reaches_storage() {
    let storage = Arc::new(RecordingStorage::default());
    let pipeline = build_pipeline(storage.clone(), &test_config(10));

    pipeline
        .run(
            vec![product_row(1, "SKU-001", "cameras, computers", "5")],
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let categories: Vec<(String, i64, i64)> = storage
        .records(EntityKind::ProductCategory)
        .into_iter()
        .map(|record| match record {
            HydratedRecord::Category(c) => (c.category_key, c.fk_category, c.product_order),
            other => panic!("类型错误: {:?}", other),
        })
        .collect();

    assert_eq!(
        categories,
        vec![
            ("cameras".to_string(), 4, 5),
            ("computers".to_string(), 5, 0)
        ]
    );
}

#[tokio::test]
async fn test_fail_fast_writes_nothing_for_failed_row() {
    let storage = Arc::new(RecordingStorage::default());
    let config = ImportConfig {
        failure_policy: FailurePolicy::FailFast,
        ..test_config(10)
    };
    let pipeline = build_pipeline(storage.clone(), &config);

    let rows = vec![
        product_row(1, "SKU-001", "toys", ""),
        product_row(2, "SKU-002", "cameras", ""),
    ];
    let report = pipeline.run(rows, CancellationToken::new()).await.unwrap();

    assert_eq!(report.state, RunState::Aborted);
    assert_eq!(report.rows_hydrated, 0);
    assert_eq!(report.rejected[0].kind, RejectionKind::CategoryKeyNotFound);
    assert!(report.abort_reason.is_some());
    assert!(storage.kinds_in_order().is_empty());
}

#[tokio::test]
async fn test_parallel_fail_fast_report_adds_up() {
    let storage = Arc::new(RecordingStorage::default());
    let config = ImportConfig {
        failure_policy: FailurePolicy::FailFast,
        parallelism: 4,
        ..test_config(10)
    };
    let pipeline = build_pipeline(storage.clone(), &config);

    // 第 2 行被拒,同块的第 3、4 行不计入报告也不落库
    let mut rows = product_rows(8);
    rows[1] = product_row(2, "SKU-002", "toys", "");
    let report = pipeline.run(rows, CancellationToken::new()).await.unwrap();

    assert_eq!(report.state, RunState::Aborted);
    assert_eq!(report.rows_read, 2);
    assert_eq!(report.rows_hydrated, 1);
    assert_eq!(report.rows_rejected(), 1);
    assert_eq!(
        report.rows_read,
        report.rows_hydrated + report.rows_rejected()
    );
    assert_eq!(storage.abstract_skus(), vec!["SKU-001".to_string()]);
}

#[tokio::test]
async fn test_pre_seeded_concrete_sku_is_rejected() {
    let storage = Arc::new(RecordingStorage::default());
    let pipeline = build_pipeline(storage.clone(), &test_config(10));

    let report = pipeline
        .run(
            vec![product_row(1, "CONCRETE-001", "cameras", "")],
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.rows_hydrated, 0);
    assert_eq!(report.rejected[0].kind, RejectionKind::AlreadyPersisted);
    assert!(storage.abstract_skus().is_empty());
}

#[tokio::test]
async fn test_storage_failure_is_fatal_under_both_policies() {
    for policy in [FailurePolicy::FailFast, FailurePolicy::CollectAndContinue] {
        let config = ImportConfig {
            failure_policy: policy,
            ..test_config(2)
        };
        let pipeline = build_pipeline(
            Arc::new(FailingStorage {
                fail_on: EntityKind::ProductCategory,
            }),
            &config,
        );

        let result = pipeline.run(product_rows(5), CancellationToken::new()).await;

        assert!(
            matches!(result, Err(ImportError::Storage(_))),
            "策略 {} 下存储失败应为致命错误",
            policy
        );
        assert_eq!(pipeline.state(), RunState::Aborted);
    }
}

#[tokio::test]
async fn test_flush_timeout_aborts_run() {
    let config = ImportConfig {
        flush_timeout: Duration::from_millis(20),
        ..test_config(1)
    };
    let pipeline = build_pipeline(
        Arc::new(SlowStorage {
            delay: Duration::from_secs(2),
        }),
        &config,
    );

    let result = pipeline.run(product_rows(3), CancellationToken::new()).await;

    assert!(matches!(
        result,
        Err(ImportError::FlushTimeout {
            kind: EntityKind::ProductAbstract,
            ..
        })
    ));
}

#[tokio::test]
async fn test_cancellation_flushes_buffered_records() {
    let storage = Arc::new(RecordingStorage::default());
    let token = CancellationToken::new();
    let pipeline =
        cancelling_pipeline(storage.clone(), AbortBufferPolicy::Flush, 4, token.clone());

    let report = pipeline.run(product_rows(10), token).await.unwrap();

    assert_eq!(report.state, RunState::Aborted);
    assert_eq!(report.abort_reason.as_deref(), Some("cancelled"));
    assert_eq!(report.rows_read, 4);
    assert_eq!(report.records_discarded, 0);
    assert_eq!(storage.abstract_skus().len(), 4);
}

#[tokio::test]
async fn test_cancellation_discards_buffered_records() {
    let storage = Arc::new(RecordingStorage::default());
    let token = CancellationToken::new();
    let pipeline =
        cancelling_pipeline(storage.clone(), AbortBufferPolicy::Discard, 2, token.clone());

    let report = pipeline.run(product_rows(10), token).await.unwrap();

    assert_eq!(report.state, RunState::Aborted);
    assert_eq!(report.rows_hydrated, 2);
    // 每行: 1 主记录 + 2 本地化 + 1 分类 + 2 URL
    assert_eq!(report.records_discarded, 12);
    assert!(storage.kinds_in_order().is_empty());
}

#[tokio::test]
async fn test_parallel_duplicates_admit_exactly_one() {
    let storage = Arc::new(RecordingStorage::default());
    let config = ImportConfig {
        parallelism: 8,
        ..test_config(100)
    };
    let pipeline = build_pipeline(storage.clone(), &config);

    let rows: Vec<_> = (1..=16)
        .map(|i| product_row(i, "SKU-RACE", "cameras", ""))
        .collect();
    let report = pipeline.run(rows, CancellationToken::new()).await.unwrap();

    assert_eq!(report.rows_hydrated, 1);
    assert_eq!(report.rows_rejected(), 15);
    assert!(report
        .rejected
        .iter()
        .all(|r| r.kind == RejectionKind::AlreadyImportedThisRun));
    assert_eq!(storage.abstract_skus(), vec!["SKU-RACE".to_string()]);
}

#[tokio::test]
async fn test_parallel_preserves_input_order() {
    let storage = Arc::new(RecordingStorage::default());
    let config = ImportConfig {
        parallelism: 4,
        ..test_config(3)
    };
    let pipeline = build_pipeline(storage.clone(), &config);

    let report = pipeline
        .run(product_rows(10), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.rows_hydrated, 10);
    let expected: Vec<String> = (1..=10).map(|i| format!("SKU-{:03}", i)).collect();
    assert_eq!(storage.abstract_skus(), expected);
}
