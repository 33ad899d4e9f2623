// ==========================================
// 商品数据导入 - 数据仓储层
// ==========================================
// 职责: 提供存储接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// 红线: Repository 不含业务逻辑
// ==========================================

pub mod error;
pub mod product_storage;
pub mod sqlite_product_storage;

// 重导出核心仓储
pub use error::{StorageError, StorageResult};
pub use product_storage::{ProductStorage, ReferenceData};
pub use sqlite_product_storage::SqliteProductStorage;
