// ==========================================
// 商品数据导入 - 导入层
// ==========================================
// 职责: 扁平输入行 → 规范化持久化记录
// 流程: 读取 → 步骤链（准备 + 水合）→ 批量写入
// ==========================================

// 模块声明
pub mod data_set;
pub mod dedup_registry;
pub mod error;
pub mod extractor_steps;
pub mod hydrator_step;
pub mod import_step_trait;
pub mod keys;
pub mod pipeline;
pub mod row_reader;
pub mod writer;

// 重导出核心类型
pub use data_set::{DataSet, DataValue};
pub use dedup_registry::DedupRegistry;
pub use error::{DuplicateKind, ImportError, ImportResult};
pub use extractor_steps::{
    AddCategoryKeysStep, AddLocalesStep, AttributesExtractorStep,
    LocalizedAttributesExtractorStep, TaxSetNameToIdStep,
};
pub use hydrator_step::ProductAbstractHydratorStep;
pub use pipeline::{product_abstract_steps, ImportPipeline, ImportPipelineBuilder};
pub use row_reader::CsvRowReader;
pub use writer::BatchWriter;

// 重导出 Trait 接口
pub use import_step_trait::ImportStep;
