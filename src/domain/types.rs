// ==========================================
// 商品数据导入 - 领域类型定义
// ==========================================
// 职责: 运行策略、实体类型等枚举
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库/配置一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 失败策略 (Failure Policy)
// ==========================================
// 行级错误的处理方式,由配置决定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailurePolicy {
    FailFast,           // 首个行级错误即中止整个运行
    CollectAndContinue, // 记录被拒行并跳过,运行结束时汇总
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::FailFast => write!(f, "FAIL_FAST"),
            FailurePolicy::CollectAndContinue => write!(f, "COLLECT_AND_CONTINUE"),
        }
    }
}

impl FailurePolicy {
    /// 从配置字符串解析（大小写/连字符不敏感）
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().replace('-', "_").as_str() {
            "FAIL_FAST" => Some(FailurePolicy::FailFast),
            "COLLECT_AND_CONTINUE" | "CONTINUE" => Some(FailurePolicy::CollectAndContinue),
            _ => None,
        }
    }
}

// ==========================================
// 中止时缓冲区处理策略
// ==========================================
// 运行中止(失败/取消)时,对已缓冲未写入的记录如何处理
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AbortBufferPolicy {
    Flush,   // 仍然写入(默认)
    Discard, // 显式丢弃,并在报告中计数
}

impl fmt::Display for AbortBufferPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortBufferPolicy::Flush => write!(f, "FLUSH"),
            AbortBufferPolicy::Discard => write!(f, "DISCARD"),
        }
    }
}

impl AbortBufferPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "FLUSH" => Some(AbortBufferPolicy::Flush),
            "DISCARD" => Some(AbortBufferPolicy::Discard),
            _ => None,
        }
    }
}

// ==========================================
// 实体类型 (Entity Kind)
// ==========================================
// 声明顺序即写入顺序: 主记录必须先于从属记录落库
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    ProductAbstract,                    // 抽象商品主记录
    ProductAbstractLocalizedAttributes, // 本地化属性
    ProductCategory,                    // 商品分类关系
    Url,                                // 商品 URL
}

impl EntityKind {
    /// 按写入顺序排列的全部实体类型
    pub const ALL: [EntityKind; 4] = [
        EntityKind::ProductAbstract,
        EntityKind::ProductAbstractLocalizedAttributes,
        EntityKind::ProductCategory,
        EntityKind::Url,
    ];

    /// 在缓冲区数组中的下标
    pub fn index(self) -> usize {
        match self {
            EntityKind::ProductAbstract => 0,
            EntityKind::ProductAbstractLocalizedAttributes => 1,
            EntityKind::ProductCategory => 2,
            EntityKind::Url => 3,
        }
    }

    /// 对应的存储表名
    pub fn table_name(self) -> &'static str {
        match self {
            EntityKind::ProductAbstract => "spy_product_abstract",
            EntityKind::ProductAbstractLocalizedAttributes => {
                "spy_product_abstract_localized_attributes"
            }
            EntityKind::ProductCategory => "spy_product_category",
            EntityKind::Url => "spy_url",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::ProductAbstract => write!(f, "PRODUCT_ABSTRACT"),
            EntityKind::ProductAbstractLocalizedAttributes => {
                write!(f, "PRODUCT_ABSTRACT_LOCALIZED_ATTRIBUTES")
            }
            EntityKind::ProductCategory => write!(f, "PRODUCT_CATEGORY"),
            EntityKind::Url => write!(f, "URL"),
        }
    }
}
