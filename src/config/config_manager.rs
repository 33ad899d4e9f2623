// ==========================================
// 商品数据导入 - 配置管理器
// ==========================================
// 职责: 导入配置加载、查询、覆写
// 存储: config_kv 表 (scope_id + key → value)
// 容错: 值无法解析时记录警告并回退默认值
// ==========================================

use crate::config::import_config_trait::{ImportConfigReader, DEFAULT_FLUSH_TIMEOUT_MS};
use crate::db::open_sqlite_connection;
use crate::domain::types::{AbortBufferPolicy, FailurePolicy};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::writer::DEFAULT_BATCH_SIZE;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::warn;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ImportResult<Self> {
        let conn = open_sqlite_connection(db_path).map_err(|e| ImportError::ConfigReadError {
            key: "*".to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager（与存储层共享连接）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_config_value(&self, key: &str) -> ImportResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| ImportError::ConfigReadError {
            key: key.to_string(),
            message: format!("锁获取失败: {}", e),
        })?;

        conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|e| ImportError::ConfigReadError {
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    /// 写入 global scope 配置（UPSERT）
    pub fn set_config_value(&self, key: &str, value: &str) -> ImportResult<()> {
        let conn = self.conn.lock().map_err(|e| ImportError::ConfigReadError {
            key: key.to_string(),
            message: format!("锁获取失败: {}", e),
        })?;

        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
            params![key, value],
        )
        .map_err(|e| ImportError::ConfigReadError {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// 获取 import.* 配置快照（用于运行日志）
    pub fn get_config_snapshot(&self) -> ImportResult<BTreeMap<String, String>> {
        let mut snapshot = BTreeMap::new();
        for key in config_keys::ALL {
            if let Some(value) = self.get_config_value(key)? {
                snapshot.insert(key.to_string(), value);
            }
        }
        Ok(snapshot)
    }

    /// 读取数值配置,缺失或无法解析时回退默认值
    fn get_number_or_default<T>(&self, key: &str, default: T) -> ImportResult<T>
    where
        T: FromStr + Copy,
    {
        let value = match self.get_config_value(key)? {
            Some(v) => v,
            None => return Ok(default),
        };

        match value.trim().parse::<T>() {
            Ok(parsed) => Ok(parsed),
            Err(_) => {
                warn!(config_key = key, raw_value = %value, "配置值格式错误，使用默认值");
                Ok(default)
            }
        }
    }

    /// 读取枚举配置,缺失或无法解析时回退默认值
    fn get_enum_or_default<T>(
        &self,
        key: &str,
        default: T,
        parse: impl Fn(&str) -> Option<T>,
    ) -> ImportResult<T> {
        let value = match self.get_config_value(key)? {
            Some(v) => v,
            None => return Ok(default),
        };

        match parse(&value) {
            Some(parsed) => Ok(parsed),
            None => {
                warn!(config_key = key, raw_value = %value, "配置值格式错误，使用默认值");
                Ok(default)
            }
        }
    }
}

// ==========================================
// ImportConfigReader Trait 实现
// ==========================================
#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_batch_size(&self) -> ImportResult<usize> {
        self.get_number_or_default(config_keys::BATCH_SIZE, DEFAULT_BATCH_SIZE)
    }

    async fn get_failure_policy(&self) -> ImportResult<FailurePolicy> {
        self.get_enum_or_default(
            config_keys::FAILURE_POLICY,
            FailurePolicy::CollectAndContinue,
            FailurePolicy::parse,
        )
    }

    async fn get_flush_timeout_ms(&self) -> ImportResult<u64> {
        self.get_number_or_default(config_keys::FLUSH_TIMEOUT_MS, DEFAULT_FLUSH_TIMEOUT_MS)
    }

    async fn get_parallelism(&self) -> ImportResult<usize> {
        self.get_number_or_default(config_keys::PARALLELISM, 1)
    }

    async fn get_abort_buffer_policy(&self) -> ImportResult<AbortBufferPolicy> {
        self.get_enum_or_default(
            config_keys::ABORT_BUFFER_POLICY,
            AbortBufferPolicy::Flush,
            AbortBufferPolicy::parse,
        )
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    pub const BATCH_SIZE: &str = "import.batch_size";
    pub const FAILURE_POLICY: &str = "import.failure_policy";
    pub const FLUSH_TIMEOUT_MS: &str = "import.flush_timeout_ms";
    pub const PARALLELISM: &str = "import.parallelism";
    pub const ABORT_BUFFER_POLICY: &str = "import.abort_buffer_policy";

    pub const ALL: [&str; 5] = [
        BATCH_SIZE,
        FAILURE_POLICY,
        FLUSH_TIMEOUT_MS,
        PARALLELISM,
        ABORT_BUFFER_POLICY,
    ];
}
