// ==========================================
// 商品数据导入 - DataSet 行数据容器
// ==========================================
// 职责: 承载单行输入及各步骤写入的派生值
// 约定: 容器本身不做类型校验,类型契约由读写该键的步骤负责
// ==========================================

use crate::domain::product::{
    LocalizedAttributes, ProductAbstract, ProductAbstractLocalizedAttributes, ProductCategory,
    ProductUrl,
};
use crate::importer::error::{ImportError, ImportResult};
use std::collections::HashMap;
use std::sync::Arc;

/// DataSet 中的值（标量 / 映射 / 类型化记录）
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    Null,
    Text(String),
    Integer(i64),
    Json(serde_json::Value),
    KeyMap(Arc<HashMap<String, i64>>), // 参考数据映射,多行共享
    Localized(Vec<LocalizedAttributes>),
    ProductAbstract(ProductAbstract),
    LocalizedRecords(Vec<ProductAbstractLocalizedAttributes>),
    CategoryRecords(Vec<ProductCategory>),
    UrlRecords(Vec<ProductUrl>),
}

impl DataValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            DataValue::Null => "null",
            DataValue::Text(_) => "text",
            DataValue::Integer(_) => "integer",
            DataValue::Json(_) => "json",
            DataValue::KeyMap(_) => "key_map",
            DataValue::Localized(_) => "localized_attributes",
            DataValue::ProductAbstract(_) => "product_abstract",
            DataValue::LocalizedRecords(_) => "localized_records",
            DataValue::CategoryRecords(_) => "category_records",
            DataValue::UrlRecords(_) => "url_records",
        }
    }
}

impl From<&str> for DataValue {
    fn from(value: &str) -> Self {
        DataValue::Text(value.to_string())
    }
}

impl From<String> for DataValue {
    fn from(value: String) -> Self {
        DataValue::Text(value)
    }
}

impl From<i64> for DataValue {
    fn from(value: i64) -> Self {
        DataValue::Integer(value)
    }
}

impl<T: Into<DataValue>> From<Option<T>> for DataValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(DataValue::Null)
    }
}

// ==========================================
// DataSet
// ==========================================
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataSet {
    row_number: usize, // 原始文件行号（用于运行报告）
    values: HashMap<String, DataValue>,
}

impl DataSet {
    pub fn new(row_number: usize) -> Self {
        Self {
            row_number,
            values: HashMap::new(),
        }
    }

    /// 从 (键, 值) 列表构造
    pub fn from_pairs<K, V, I>(row_number: usize, pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<DataValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut data_set = Self::new(row_number);
        for (key, value) in pairs {
            data_set.set(key, value);
        }
        data_set
    }

    pub fn row_number(&self) -> usize {
        self.row_number
    }

    /// 读取键值
    ///
    /// # 返回
    /// - Err(MissingKey): 键不存在
    pub fn get(&self, key: &str) -> ImportResult<&DataValue> {
        self.values.get(key).ok_or_else(|| ImportError::MissingKey {
            row: self.row_number,
            key: key.to_string(),
        })
    }

    /// 写入键值（总是成功,覆盖旧值）
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<DataValue>) {
        self.values.insert(key.into(), value.into());
    }

    /// 取出键值（写入器消费派生记录时使用,避免克隆）
    pub fn take(&mut self, key: &str) -> ImportResult<DataValue> {
        self.values.remove(key).ok_or_else(|| ImportError::MissingKey {
            row: self.row_number,
            key: key.to_string(),
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    // ===== 类型化读取 =====

    /// 必填文本（NULL 视为缺失）
    pub fn get_str(&self, key: &str) -> ImportResult<&str> {
        match self.get(key)? {
            DataValue::Text(s) => Ok(s.as_str()),
            DataValue::Null => Err(ImportError::MissingKey {
                row: self.row_number,
                key: key.to_string(),
            }),
            other => Err(self.unexpected(key, "text", other)),
        }
    }

    /// 可空文本（键必须存在,NULL → None）
    pub fn get_optional_str(&self, key: &str) -> ImportResult<Option<&str>> {
        match self.get(key)? {
            DataValue::Text(s) => Ok(Some(s.as_str())),
            DataValue::Null => Ok(None),
            other => Err(self.unexpected(key, "text", other)),
        }
    }

    /// 可空整数（键必须存在,NULL → None）
    pub fn get_optional_int(&self, key: &str) -> ImportResult<Option<i64>> {
        match self.get(key)? {
            DataValue::Integer(v) => Ok(Some(*v)),
            DataValue::Null => Ok(None),
            other => Err(self.unexpected(key, "integer", other)),
        }
    }

    pub fn get_json(&self, key: &str) -> ImportResult<&serde_json::Value> {
        match self.get(key)? {
            DataValue::Json(v) => Ok(v),
            other => Err(self.unexpected(key, "json", other)),
        }
    }

    pub fn get_key_map(&self, key: &str) -> ImportResult<&HashMap<String, i64>> {
        match self.get(key)? {
            DataValue::KeyMap(map) => Ok(map.as_ref()),
            other => Err(self.unexpected(key, "key_map", other)),
        }
    }

    pub fn get_localized(&self, key: &str) -> ImportResult<&[LocalizedAttributes]> {
        match self.get(key)? {
            DataValue::Localized(list) => Ok(list.as_slice()),
            other => Err(self.unexpected(key, "localized_attributes", other)),
        }
    }

    fn unexpected(&self, key: &str, expected: &'static str, actual: &DataValue) -> ImportError {
        ImportError::UnexpectedValueType {
            row: self.row_number,
            key: key.to_string(),
            expected,
            actual: actual.type_name(),
        }
    }
}
