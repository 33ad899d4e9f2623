// ==========================================
// 商品数据导入 - 运行报告与状态机
// ==========================================
// 职责: 行/运行状态机、被拒行明细、写入统计
// 行状态: Pending → Hydrating → {Hydrated | Rejected}
// 运行状态: Idle → Running → {Completed | Aborted}
// ==========================================

use crate::domain::types::{EntityKind, FailurePolicy};
use crate::importer::error::{ImportError, ImportResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ==========================================
// RowState - 行状态
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowState {
    Pending,
    Hydrating,
    Hydrated,
    Rejected,
}

impl RowState {
    /// 校验并执行状态转换
    pub fn transition(self, next: RowState) -> ImportResult<RowState> {
        let allowed = matches!(
            (self, next),
            (RowState::Pending, RowState::Hydrating)
                | (RowState::Hydrating, RowState::Hydrated)
                | (RowState::Hydrating, RowState::Rejected)
        );
        if allowed {
            Ok(next)
        } else {
            Err(ImportError::InvalidStateTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl fmt::Display for RowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowState::Pending => write!(f, "PENDING"),
            RowState::Hydrating => write!(f, "HYDRATING"),
            RowState::Hydrated => write!(f, "HYDRATED"),
            RowState::Rejected => write!(f, "REJECTED"),
        }
    }
}

// ==========================================
// RunState - 运行状态
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Aborted,
}

impl RunState {
    pub fn transition(self, next: RunState) -> ImportResult<RunState> {
        let allowed = matches!(
            (self, next),
            (RunState::Idle, RunState::Running)
                | (RunState::Running, RunState::Completed)
                | (RunState::Running, RunState::Aborted)
        );
        if allowed {
            Ok(next)
        } else {
            Err(ImportError::InvalidStateTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Completed | RunState::Aborted)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => write!(f, "IDLE"),
            RunState::Running => write!(f, "RUNNING"),
            RunState::Completed => write!(f, "COMPLETED"),
            RunState::Aborted => write!(f, "ABORTED"),
        }
    }
}

// ==========================================
// RejectionKind - 被拒原因分类
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionKind {
    AlreadyPersisted,
    AlreadyImportedThisRun,
    CategoryKeyNotFound,
    MalformedOrdinal,
    TaxSetNotFound,
    MissingKey,
    InvalidValue,
}

impl fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectionKind::AlreadyPersisted => "ALREADY_PERSISTED",
            RejectionKind::AlreadyImportedThisRun => "ALREADY_IMPORTED_THIS_RUN",
            RejectionKind::CategoryKeyNotFound => "CATEGORY_KEY_NOT_FOUND",
            RejectionKind::MalformedOrdinal => "MALFORMED_ORDINAL",
            RejectionKind::TaxSetNotFound => "TAX_SET_NOT_FOUND",
            RejectionKind::MissingKey => "MISSING_KEY",
            RejectionKind::InvalidValue => "INVALID_VALUE",
        };
        write!(f, "{}", s)
    }
}

// ==========================================
// RejectedRow - 被拒行明细
// ==========================================
// 用途: 让调用方只重新提交修正后的行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedRow {
    pub row_number: usize,            // 原始文件行号
    pub abstract_sku: Option<String>, // 外部 SKU（如果可解析）
    pub kind: RejectionKind,          // 原因分类
    pub reason: String,               // 可读原因
}

// ==========================================
// RunReport - 运行报告
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub batch_id: String,                              // 批次 ID（UUID）
    pub state: RunState,                               // 最终运行状态
    pub policy: FailurePolicy,                         // 失败策略
    pub started_at: DateTime<Utc>,                     // 开始时间
    pub finished_at: Option<DateTime<Utc>>,            // 结束时间
    pub rows_read: usize,                              // 已读取行数
    pub rows_hydrated: usize,                          // 水合成功行数
    pub rejected: Vec<RejectedRow>,                    // 被拒行明细
    pub records_written: BTreeMap<EntityKind, usize>,  // 各实体写入数
    pub records_discarded: usize,                      // 中止时丢弃的缓冲记录数
    pub abort_reason: Option<String>,                  // 中止原因
    pub elapsed_ms: u64,                               // 耗时（毫秒）
}

impl RunReport {
    pub fn new(batch_id: impl Into<String>, policy: FailurePolicy) -> Self {
        Self {
            batch_id: batch_id.into(),
            state: RunState::Idle,
            policy,
            started_at: Utc::now(),
            finished_at: None,
            rows_read: 0,
            rows_hydrated: 0,
            rejected: Vec::new(),
            records_written: EntityKind::ALL.iter().map(|k| (*k, 0)).collect(),
            records_discarded: 0,
            abort_reason: None,
            elapsed_ms: 0,
        }
    }

    pub fn transition(&mut self, next: RunState) -> ImportResult<()> {
        self.state = self.state.transition(next)?;
        if self.state.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    pub fn rows_rejected(&self) -> usize {
        self.rejected.len()
    }

    pub fn written(&self, kind: EntityKind) -> usize {
        self.records_written.get(&kind).copied().unwrap_or(0)
    }

    pub fn add_written(&mut self, kind: EntityKind, count: usize) {
        *self.records_written.entry(kind).or_insert(0) += count;
    }

    pub fn is_completed(&self) -> bool {
        self.state == RunState::Completed
    }
}
