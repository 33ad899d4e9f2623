// ==========================================
// 商品数据导入 - 上游准备步骤
// ==========================================
// 职责: 为水合步骤准备参考映射与结构化属性
// 顺序: AddLocales → AddCategoryKeys → TaxSetNameToId
//       → AttributesExtractor → LocalizedAttributesExtractor
// 约定: 参考映射在运行期间只读,以 Arc 在行间共享
// ==========================================

use crate::domain::product::LocalizedAttributes;
use crate::importer::data_set::{DataSet, DataValue};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::import_step_trait::ImportStep;
use crate::importer::keys;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

// ==========================================
// AddLocalesStep - 写入 locale 名称 → ID 映射
// ==========================================
pub struct AddLocalesStep {
    locales: Arc<HashMap<String, i64>>,
}

impl AddLocalesStep {
    pub fn new(locales: Arc<HashMap<String, i64>>) -> Self {
        Self { locales }
    }
}

impl ImportStep for AddLocalesStep {
    fn name(&self) -> &'static str {
        "AddLocalesStep"
    }

    fn execute(&self, data_set: &mut DataSet) -> ImportResult<()> {
        data_set.set(keys::LOCALES, DataValue::KeyMap(Arc::clone(&self.locales)));
        Ok(())
    }
}

// ==========================================
// AddCategoryKeysStep - 写入分类键 → ID 映射
// ==========================================
pub struct AddCategoryKeysStep {
    category_keys: Arc<HashMap<String, i64>>,
}

impl AddCategoryKeysStep {
    pub fn new(category_keys: Arc<HashMap<String, i64>>) -> Self {
        Self { category_keys }
    }
}

impl ImportStep for AddCategoryKeysStep {
    fn name(&self) -> &'static str {
        "AddCategoryKeysStep"
    }

    fn execute(&self, data_set: &mut DataSet) -> ImportResult<()> {
        data_set.set(
            keys::CATEGORY_KEYS,
            DataValue::KeyMap(Arc::clone(&self.category_keys)),
        );
        Ok(())
    }
}

// ==========================================
// TaxSetNameToIdStep - 税组名称 → ID
// ==========================================
// 规则: 名称为空 → idTaxSet = NULL；名称未知 → TaxSetNotFound
pub struct TaxSetNameToIdStep {
    tax_sets: Arc<HashMap<String, i64>>,
}

impl TaxSetNameToIdStep {
    pub fn new(tax_sets: Arc<HashMap<String, i64>>) -> Self {
        Self { tax_sets }
    }
}

impl ImportStep for TaxSetNameToIdStep {
    fn name(&self) -> &'static str {
        "TaxSetNameToIdStep"
    }

    fn execute(&self, data_set: &mut DataSet) -> ImportResult<()> {
        let id_tax_set = match optional_text(data_set, keys::TAX_SET_NAME)? {
            None => DataValue::Null,
            Some(name) => match self.tax_sets.get(&name) {
                Some(id) => DataValue::Integer(*id),
                None => {
                    return Err(ImportError::TaxSetNotFound {
                        row: data_set.row_number(),
                        name,
                    })
                }
            },
        };

        data_set.set(keys::ID_TAX_SET, id_tax_set);
        Ok(())
    }
}

// ==========================================
// AttributesExtractorStep - 通用属性
// ==========================================
// 列: attribute_key_{N} / value_{N}（不含 locale 后缀）
pub struct AttributesExtractorStep;

impl ImportStep for AttributesExtractorStep {
    fn name(&self) -> &'static str {
        "AttributesExtractorStep"
    }

    fn execute(&self, data_set: &mut DataSet) -> ImportResult<()> {
        let attributes = extract_attribute_pairs(data_set, None)?;
        data_set.set(keys::ATTRIBUTES, DataValue::Json(Value::Object(attributes)));
        Ok(())
    }
}

// ==========================================
// LocalizedAttributesExtractorStep - 本地化属性
// ==========================================
// 列: {field}.{locale}、attribute_key_{N}.{locale} / value_{N}.{locale}
// 规则:
// - locale 按 ID 升序处理（输出顺序确定）
// - name 与 url 均为空 → 跳过该 locale
// - 否则 name、url 均为必填
pub struct LocalizedAttributesExtractorStep;

impl LocalizedAttributesExtractorStep {
    fn extract_locale(
        data_set: &DataSet,
        locale_name: &str,
        id_locale: i64,
    ) -> ImportResult<Option<LocalizedAttributes>> {
        let name_key = keys::localized_column(keys::NAME, locale_name);
        let url_key = keys::localized_column(keys::URL, locale_name);

        let (name, url) = match (
            optional_text(data_set, &name_key)?,
            optional_text(data_set, &url_key)?,
        ) {
            (None, None) => return Ok(None),
            (Some(name), Some(url)) => (name, url),
            (None, Some(_)) => {
                return Err(ImportError::MissingKey {
                    row: data_set.row_number(),
                    key: name_key,
                })
            }
            (Some(_), None) => {
                return Err(ImportError::MissingKey {
                    row: data_set.row_number(),
                    key: url_key,
                })
            }
        };

        let localized_field = |field: &str| {
            optional_text(data_set, &keys::localized_column(field, locale_name))
        };

        Ok(Some(LocalizedAttributes {
            id_locale,
            locale_name: locale_name.to_string(),
            name,
            url,
            description: localized_field(keys::DESCRIPTION)?,
            meta_title: localized_field(keys::META_TITLE)?,
            meta_description: localized_field(keys::META_DESCRIPTION)?,
            meta_keywords: localized_field(keys::META_KEYWORDS)?,
            attributes: Value::Object(extract_attribute_pairs(data_set, Some(locale_name))?),
        }))
    }
}

impl ImportStep for LocalizedAttributesExtractorStep {
    fn name(&self) -> &'static str {
        "LocalizedAttributesExtractorStep"
    }

    fn execute(&self, data_set: &mut DataSet) -> ImportResult<()> {
        let mut locales: Vec<(&String, &i64)> = data_set.get_key_map(keys::LOCALES)?.iter().collect();
        locales.sort_by_key(|(_, id)| **id);

        let mut localized = Vec::with_capacity(locales.len());
        for (locale_name, id_locale) in locales {
            if let Some(attributes) = Self::extract_locale(data_set, locale_name, *id_locale)? {
                localized.push(attributes);
            }
        }

        debug!(
            row = data_set.row_number(),
            locales = localized.len(),
            "本地化属性提取完成"
        );

        data_set.set(keys::LOCALIZED_ATTRIBUTES, DataValue::Localized(localized));
        Ok(())
    }
}

// ===== 辅助函数 =====

/// 读取可选文本列: 列不存在 / NULL / 全空白 → None
fn optional_text(data_set: &DataSet, key: &str) -> ImportResult<Option<String>> {
    if !data_set.contains(key) {
        return Ok(None);
    }
    Ok(data_set
        .get_optional_str(key)?
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string))
}

/// 收集 attribute_key_{N}[.{locale}] / value_{N}[.{locale}] 列对
///
/// # 参数
/// - locale_name: None 表示通用属性（列名不含 '.'）
fn extract_attribute_pairs(
    data_set: &DataSet,
    locale_name: Option<&str>,
) -> ImportResult<Map<String, Value>> {
    let suffix = locale_name.map(|locale| format!(".{}", locale));

    let mut indices: Vec<String> = data_set
        .keys()
        .filter_map(|key| key.strip_prefix(keys::ATTRIBUTE_KEY_PREFIX))
        .filter_map(|rest| match &suffix {
            Some(suffix) => rest.strip_suffix(suffix.as_str()),
            None if !rest.contains('.') => Some(rest),
            None => None,
        })
        .map(str::to_string)
        .collect();
    indices.sort_by_key(|index| (index.parse::<u32>().unwrap_or(u32::MAX), index.clone()));

    let mut attributes = Map::new();
    for index in indices {
        let column = |prefix: &str| match &suffix {
            Some(suffix) => format!("{}{}{}", prefix, index, suffix),
            None => format!("{}{}", prefix, index),
        };

        let attribute_key = match optional_text(data_set, &column(keys::ATTRIBUTE_KEY_PREFIX))? {
            Some(key) => key,
            None => continue,
        };
        let value = optional_text(data_set, &column(keys::ATTRIBUTE_VALUE_PREFIX))?
            .map(Value::String)
            .unwrap_or(Value::Null);

        attributes.insert(attribute_key, value);
    }

    Ok(attributes)
}
