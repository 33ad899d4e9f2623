// ==========================================
// 商品数据导入 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入管道所需的配置读取接口与配置快照
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::domain::types::{AbortBufferPolicy, FailurePolicy};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::writer::DEFAULT_BATCH_SIZE;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 默认刷新超时（毫秒）
pub const DEFAULT_FLUSH_TIMEOUT_MS: u64 = 30_000;

// ==========================================
// ImportConfig - 单次运行的配置快照
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportConfig {
    pub batch_size: usize,                      // 批次大小（主记录数）
    pub failure_policy: FailurePolicy,          // 行级错误处理策略
    pub flush_timeout: Duration,                // 单次存储调用超时
    pub parallelism: usize,                     // 并行水合行数（1 = 顺序）
    pub abort_buffer_policy: AbortBufferPolicy, // 中止时缓冲区处理
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            failure_policy: FailurePolicy::CollectAndContinue,
            flush_timeout: Duration::from_millis(DEFAULT_FLUSH_TIMEOUT_MS),
            parallelism: 1,
            abort_buffer_policy: AbortBufferPolicy::Flush,
        }
    }
}

impl ImportConfig {
    /// 校验配置取值
    ///
    /// # 返回
    /// - Err(ConfigValueError): batch_size / parallelism / flush_timeout 为 0
    pub fn validate(&self) -> ImportResult<()> {
        if self.batch_size == 0 {
            return Err(zero_value_error("import.batch_size"));
        }
        if self.parallelism == 0 {
            return Err(zero_value_error("import.parallelism"));
        }
        if self.flush_timeout.is_zero() {
            return Err(zero_value_error("import.flush_timeout_ms"));
        }
        Ok(())
    }
}

fn zero_value_error(key: &str) -> ImportError {
    ImportError::ConfigValueError {
        key: key.to_string(),
        value: "0".to_string(),
        message: "必须大于 0".to_string(),
    }
}

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入管道所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    /// 获取批次大小
    ///
    /// # 默认值
    /// - 5000
    async fn get_batch_size(&self) -> ImportResult<usize>;

    /// 获取失败策略
    ///
    /// # 默认值
    /// - COLLECT_AND_CONTINUE
    async fn get_failure_policy(&self) -> ImportResult<FailurePolicy>;

    /// 获取刷新超时（毫秒）
    ///
    /// # 默认值
    /// - 30000
    async fn get_flush_timeout_ms(&self) -> ImportResult<u64>;

    /// 获取并行水合行数
    ///
    /// # 默认值
    /// - 1（顺序处理）
    async fn get_parallelism(&self) -> ImportResult<usize>;

    /// 获取中止时缓冲区处理策略
    ///
    /// # 默认值
    /// - FLUSH
    async fn get_abort_buffer_policy(&self) -> ImportResult<AbortBufferPolicy>;

    /// 读取并校验完整导入配置
    async fn load_import_config(&self) -> ImportResult<ImportConfig> {
        let config = ImportConfig {
            batch_size: self.get_batch_size().await?,
            failure_policy: self.get_failure_policy().await?,
            flush_timeout: Duration::from_millis(self.get_flush_timeout_ms().await?),
            parallelism: self.get_parallelism().await?,
            abort_buffer_policy: self.get_abort_buffer_policy().await?,
        };
        config.validate()?;
        Ok(config)
    }
}
