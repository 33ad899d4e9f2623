// ==========================================
// 商品数据导入 - 命令行入口
// ==========================================
// 用法:
//   product-data-import [db_path] [csv_path]
//   LOG_FORMAT=json 输出 JSON 日志（默认人类可读格式）
//
// 流程: 建表 → 读取配置 → 加载参考数据 → 读取 CSV → 运行管道 → 保存/输出报告
// 退出码: 0 = 完成；1 = 致命错误；2 = 运行中止（快速失败 / Ctrl-C）
// ==========================================

use anyhow::Context;
use product_data_import::config::{ConfigManager, ImportConfigReader};
use product_data_import::importer::{BatchWriter, CsvRowReader, ImportPipeline};
use product_data_import::repository::SqliteProductStorage;
use product_data_import::{logging, APP_NAME, VERSION};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const DEFAULT_DB_PATH: &str = "product_data_import.db";
const DEFAULT_CSV_PATH: &str = "product_abstract.csv";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_with_format(logging::LogFormat::from_env());

    let mut args = std::env::args().skip(1);
    let db_path = args.next().unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
    let csv_path = args.next().unwrap_or_else(|| DEFAULT_CSV_PATH.to_string());

    info!(version = VERSION, db_path = %db_path, csv_path = %csv_path, "{}", APP_NAME);

    let storage = Arc::new(
        SqliteProductStorage::new(&db_path)
            .with_context(|| format!("无法打开数据库: {}", db_path))?,
    );

    let config_manager = ConfigManager::from_connection(storage.connection());
    let config = config_manager.load_import_config().await?;
    info!(snapshot = ?config_manager.get_config_snapshot()?, "导入配置已加载");

    let reference = storage.load_reference_data().await?;
    let rows = CsvRowReader::new(&csv_path)
        .read_all()
        .with_context(|| format!("无法读取 CSV: {}", csv_path))?;

    let writer = Arc::new(BatchWriter::new(
        storage.clone(),
        config.batch_size,
        config.flush_timeout,
    ));
    let pipeline = ImportPipeline::builder()
        .product_abstract_chain(&reference)
        .config(&config)
        .writer(writer)
        .build()?;

    // Ctrl-C → 停止调度新行,按缓冲策略收尾
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("收到中断信号，正在停止导入");
                cancel.cancel();
            }
        });
    }

    let report = pipeline.run(rows, cancel).await?;
    storage.save_run_report(&report).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.is_completed() {
        std::process::exit(2);
    }
    Ok(())
}
