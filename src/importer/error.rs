// ==========================================
// 商品数据导入 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分类: 行级错误（可按策略跳过）/ 运行级错误（总是致命）
// ==========================================

use crate::domain::report::RejectionKind;
use crate::domain::types::EntityKind;
use crate::repository::error::StorageError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ==========================================
// DuplicateKind - SKU 重复类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DuplicateKind {
    AlreadyPersisted,       // 已作为具体商品持久化
    AlreadyImportedThisRun, // 本次运行中已导入
}

impl DuplicateKind {
    /// 面向用户的原因描述
    pub fn reason(self) -> &'static str {
        match self {
            DuplicateKind::AlreadyPersisted => "已作为其他类型记录（具体商品）存在",
            DuplicateKind::AlreadyImportedThisRun => "本次运行中已导入",
        }
    }
}

impl fmt::Display for DuplicateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicateKind::AlreadyPersisted => write!(f, "ALREADY_PERSISTED"),
            DuplicateKind::AlreadyImportedThisRun => write!(f, "ALREADY_IMPORTED_THIS_RUN"),
        }
    }
}

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .csv）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    // ===== DataSet 契约错误 =====
    #[error("数据键缺失 (行 {row}): {key}")]
    MissingKey { row: usize, key: String },

    #[error("数据类型不符 (行 {row}, 键 {key}): 期望 {expected}，实际 {actual}")]
    UnexpectedValueType {
        row: usize,
        key: String,
        expected: &'static str,
        actual: &'static str,
    },

    // ===== 行级校验错误 =====
    #[error("SKU \"{sku}\" {} (行 {row})", .kind.reason())]
    DuplicateSku {
        row: usize,
        sku: String,
        kind: DuplicateKind,
    },

    #[error(
        "分类键 \"{key}\" 不在 categoryKeys 中，可能存在拼写错误 (行 {row})。已知分类: \"{}\"",
        .known_keys.join(", ")
    )]
    CategoryKeyNotFound {
        row: usize,
        key: String,
        known_keys: Vec<String>,
    },

    #[error("分类排序值非法 (行 {row}, 位置 {index}): \"{value}\" 不是整数")]
    MalformedOrdinal {
        row: usize,
        index: usize,
        value: String,
    },

    #[error("税组不存在 (行 {row}): {name}")]
    TaxSetNotFound { row: usize, name: String },

    #[error("序列化失败: {0}")]
    Serialization(String),

    // ===== 写入错误（致命）=====
    #[error("存储写入失败: {0}")]
    Storage(#[from] StorageError),

    #[error("批量写入超时 ({kind}, {timeout_ms} ms)")]
    FlushTimeout { kind: EntityKind, timeout_ms: u128 },

    // ===== 运行控制错误 =====
    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("去重注册表已初始化，不允许重复加载")]
    RegistryAlreadySeeded,

    // ===== 配置错误 =====
    #[error("配置读取失败 (key: {key}): {message}")]
    ConfigReadError { key: String, message: String },

    #[error("配置值格式错误 (key: {key}, value: {value}): {message}")]
    ConfigValueError {
        key: String,
        value: String,
        message: String,
    },

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    /// 是否为行级错误（按失败策略决定跳过还是中止）
    pub fn is_row_scoped(&self) -> bool {
        matches!(
            self,
            ImportError::MissingKey { .. }
                | ImportError::UnexpectedValueType { .. }
                | ImportError::DuplicateSku { .. }
                | ImportError::CategoryKeyNotFound { .. }
                | ImportError::MalformedOrdinal { .. }
                | ImportError::TaxSetNotFound { .. }
                | ImportError::Serialization(_)
        )
    }

    /// 行级错误在运行报告中的分类
    pub fn rejection_kind(&self) -> Option<RejectionKind> {
        match self {
            ImportError::DuplicateSku {
                kind: DuplicateKind::AlreadyPersisted,
                ..
            } => Some(RejectionKind::AlreadyPersisted),
            ImportError::DuplicateSku {
                kind: DuplicateKind::AlreadyImportedThisRun,
                ..
            } => Some(RejectionKind::AlreadyImportedThisRun),
            ImportError::CategoryKeyNotFound { .. } => Some(RejectionKind::CategoryKeyNotFound),
            ImportError::MalformedOrdinal { .. } => Some(RejectionKind::MalformedOrdinal),
            ImportError::TaxSetNotFound { .. } => Some(RejectionKind::TaxSetNotFound),
            ImportError::MissingKey { .. } => Some(RejectionKind::MissingKey),
            ImportError::UnexpectedValueType { .. } | ImportError::Serialization(_) => {
                Some(RejectionKind::InvalidValue)
            }
            _ => None,
        }
    }
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<serde_json::Error>
impl From<serde_json::Error> for ImportError {
    fn from(err: serde_json::Error) -> Self {
        ImportError::Serialization(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
