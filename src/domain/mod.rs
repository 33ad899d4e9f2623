// ==========================================
// 商品数据导入 - 领域模型层
// ==========================================
// 职责: 定义持久化记录、运行报告、策略枚举
// 红线: 不含数据访问逻辑,不含导入流程逻辑
// ==========================================

pub mod product;
pub mod report;
pub mod types;

// 重导出核心类型
pub use product::{
    HydratedRecord, LocalizedAttributes, ProductAbstract, ProductAbstractLocalizedAttributes,
    ProductCategory, ProductUrl,
};
pub use report::{RejectedRow, RejectionKind, RowState, RunReport, RunState};
pub use types::{AbortBufferPolicy, EntityKind, FailurePolicy};
