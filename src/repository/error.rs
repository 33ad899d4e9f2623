// ==========================================
// 商品数据导入 - 存储层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 约定: 写入阶段的任何 StorageError 对整个运行都是致命的
// ==========================================

use thiserror::Error;

/// 存储层错误类型
#[derive(Error, Debug)]
pub enum StorageError {
    // ===== 数据库错误 =====
    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库锁获取失败: {0}")]
    LockError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    #[error("数据库查询失败: {0}")]
    DatabaseQueryError(String),

    #[error("唯一约束违反: {0}")]
    UniqueConstraintViolation(String),

    #[error("外键约束违反: {0}")]
    ForeignKeyViolation(String),

    // ===== 数据错误 =====
    #[error("主记录未找到: abstract_sku={sku}")]
    PrimaryRecordMissing { sku: String },

    #[error("批次记录类型不一致: 期望 {expected}, 实际 {actual}")]
    MixedBatch { expected: String, actual: String },

    #[error("序列化失败: {0}")]
    SerializationError(String),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// 实现 From<rusqlite::Error>
impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(_, Some(msg)) => {
                if msg.contains("UNIQUE") {
                    StorageError::UniqueConstraintViolation(msg)
                } else if msg.contains("FOREIGN KEY") {
                    StorageError::ForeignKeyViolation(msg)
                } else {
                    StorageError::DatabaseQueryError(msg)
                }
            }
            _ => StorageError::DatabaseQueryError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::SerializationError(err.to_string())
    }
}

/// Result 类型别名
pub type StorageResult<T> = Result<T, StorageError>;
