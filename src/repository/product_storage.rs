// ==========================================
// 商品数据导入 - 商品存储 Trait
// ==========================================
// 职责: 定义写入器所需的批量持久化接口（不包含业务逻辑）
// 红线: 存储层不做去重/校验,只做数据写入
// ==========================================

use crate::domain::product::HydratedRecord;
use crate::domain::types::EntityKind;
use crate::repository::error::StorageResult;
use async_trait::async_trait;
use std::collections::HashMap;

// ==========================================
// ProductStorage Trait
// ==========================================
// 用途: 写入器刷新批次时调用
// 实现者: SqliteProductStorage（使用 rusqlite）,测试中的内存实现
#[async_trait]
pub trait ProductStorage: Send + Sync {
    /// 批量持久化同类记录（单事务）
    ///
    /// # 参数
    /// - kind: 实体类型（批次内所有记录必须一致）
    /// - records: 记录列表
    ///
    /// # 返回
    /// - Ok(usize): 写入的记录数
    /// - Err: 存储错误（整个批次回滚,运行中止）
    async fn persist_batch(
        &self,
        kind: EntityKind,
        records: Vec<HydratedRecord>,
    ) -> StorageResult<usize>;
}

// ==========================================
// ReferenceData - 运行前加载的参考数据
// ==========================================
// 生命周期: 运行开始时加载一次,运行期间只读
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    pub locales: HashMap<String, i64>,       // locale 名称 → ID
    pub category_keys: HashMap<String, i64>, // 分类键 → ID
    pub tax_sets: HashMap<String, i64>,      // 税组名称 → ID
    pub existing_concrete_skus: Vec<String>, // 已持久化具体商品 SKU（去重种子）
}
