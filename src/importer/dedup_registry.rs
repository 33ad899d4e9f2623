// ==========================================
// 商品数据导入 - SKU 去重注册表
// ==========================================
// 职责: 检测跨批次（已持久化）/ 本次运行内重复的 SKU
// 生命周期: 随管道创建,运行结束即丢弃,不持久化
// 并发: check_and_reserve 为单次加锁的原子操作
// ==========================================

use crate::importer::error::{DuplicateKind, ImportError, ImportResult};
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Default)]
pub struct DedupRegistry {
    // 已持久化的具体商品 SKU（加载一次,之后只读）
    persisted: HashSet<String>,
    seeded: bool,

    // 本次运行已解析的抽象商品 SKU
    resolved: Mutex<HashSet<String>>,
}

impl DedupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建并加载已持久化 SKU
    pub fn seeded<I>(existing_keys: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            persisted: existing_keys.into_iter().collect(),
            seeded: true,
            resolved: Mutex::new(HashSet::new()),
        }
    }

    /// 一次性加载已持久化 SKU（处理开始前调用）
    ///
    /// # 返回
    /// - Ok(usize): 加载的 SKU 数
    /// - Err(RegistryAlreadySeeded): 重复加载
    pub fn seed<I>(&mut self, existing_keys: I) -> ImportResult<usize>
    where
        I: IntoIterator<Item = String>,
    {
        if self.seeded {
            return Err(ImportError::RegistryAlreadySeeded);
        }
        self.persisted.extend(existing_keys);
        self.seeded = true;
        Ok(self.persisted.len())
    }

    /// 检查并预留 SKU
    ///
    /// # 返回
    /// - Ok(()): 首次出现,已预留
    /// - Err(AlreadyPersisted): 已作为具体商品存在
    /// - Err(AlreadyImportedThisRun): 本次运行中已预留
    pub fn check_and_reserve(&self, key: &str) -> Result<(), DuplicateKind> {
        if self.persisted.contains(key) {
            return Err(DuplicateKind::AlreadyPersisted);
        }

        // insert 返回 false 即已存在: 检查与预留在同一把锁内完成
        let mut resolved = self.resolved.lock().unwrap_or_else(PoisonError::into_inner);
        if resolved.insert(key.to_string()) {
            Ok(())
        } else {
            Err(DuplicateKind::AlreadyImportedThisRun)
        }
    }

    pub fn is_reserved(&self, key: &str) -> bool {
        self.resolved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }

    pub fn reserved_count(&self) -> usize {
        self.resolved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn seeded_count(&self) -> usize {
        self.persisted.len()
    }
}
