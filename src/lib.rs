// ==========================================
// 商品数据导入 - 核心库
// ==========================================
// 职责: 抽象商品数据导入管道
// 技术栈: Rust + tokio + SQLite
// 流程: 扁平行 → 步骤链水合 → 去重 → 批量写入 → 运行报告
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 记录与报告
pub mod domain;

// 数据仓储层 - 存储接口与 SQLite 实现
pub mod repository;

// 导入层 - 步骤链、管道、写入器
pub mod importer;

// 配置层 - 导入参数
pub mod config;

// 数据库基础设施（连接初始化/建表）
pub mod db;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::{
    AbortBufferPolicy, EntityKind, FailurePolicy, HydratedRecord, RejectedRow, RejectionKind,
    RunReport, RunState,
};

// 导入
pub use importer::{
    BatchWriter, CsvRowReader, DataSet, DataValue, DedupRegistry, ImportError, ImportPipeline,
    ImportResult, ImportStep, ProductAbstractHydratorStep,
};

// 存储与配置
pub use config::{ConfigManager, ImportConfig, ImportConfigReader};
pub use repository::{ProductStorage, ReferenceData, SqliteProductStorage, StorageError};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "商品数据导入";
