// ==========================================
// 商品数据导入 - 抽象商品水合步骤
// ==========================================
// 职责: 将一行扁平输入展开为主记录/本地化/分类/URL 记录
// 流程: SKU 去重 → 主记录 → 本地化属性 → 分类关系 → URL
// 约定: 任何一步失败整行作废,派生键只在全部成功后写回
// ==========================================

use crate::domain::product::{
    ProductAbstract, ProductAbstractLocalizedAttributes, ProductCategory, ProductUrl,
};
use crate::importer::data_set::{DataSet, DataValue};
use crate::importer::dedup_registry::DedupRegistry;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::import_step_trait::ImportStep;
use crate::importer::keys;
use std::sync::Arc;
use tracing::debug;

// ==========================================
// ProductAbstractHydratorStep
// ==========================================
pub struct ProductAbstractHydratorStep {
    registry: Arc<DedupRegistry>,
}

impl ProductAbstractHydratorStep {
    /// 创建水合步骤
    ///
    /// # 参数
    /// - registry: 运行级去重注册表（由管道持有,共享句柄）
    pub fn new(registry: Arc<DedupRegistry>) -> Self {
        Self { registry }
    }

    /// 步骤 1: SKU 去重检查并预留
    fn check_sku_product_already_exists(&self, data_set: &DataSet) -> ImportResult<String> {
        let sku = data_set.get_str(keys::ABSTRACT_SKU)?;

        self.registry
            .check_and_reserve(sku)
            .map_err(|kind| ImportError::DuplicateSku {
                row: data_set.row_number(),
                sku: sku.to_string(),
                kind,
            })?;

        Ok(sku.to_string())
    }

    /// 步骤 2: 主记录
    fn hydrate_product_abstract(
        &self,
        data_set: &DataSet,
        sku: &str,
    ) -> ImportResult<ProductAbstract> {
        Ok(ProductAbstract {
            sku: sku.to_string(),
            color_code: data_set
                .get_optional_str(keys::COLOR_CODE)?
                .map(str::to_string),
            fk_tax_set: data_set.get_optional_int(keys::ID_TAX_SET)?,
            attributes: serde_json::to_string(data_set.get_json(keys::ATTRIBUTES)?)?,
            // 原样透传: NULL 表示未排期
            new_from: data_set.get_optional_str(keys::NEW_FROM)?.map(str::to_string),
            new_to: data_set.get_optional_str(keys::NEW_TO)?.map(str::to_string),
        })
    }

    /// 步骤 3: 本地化属性（保持上游 locale 顺序）
    fn hydrate_localized_attributes(
        &self,
        data_set: &DataSet,
        sku: &str,
    ) -> ImportResult<Vec<ProductAbstractLocalizedAttributes>> {
        data_set
            .get_localized(keys::LOCALIZED_ATTRIBUTES)?
            .iter()
            .map(|localized| -> ImportResult<_> {
                Ok(ProductAbstractLocalizedAttributes {
                    abstract_sku: sku.to_string(),
                    fk_locale: localized.id_locale,
                    name: localized.name.clone(),
                    description: localized.description.clone(),
                    meta_title: localized.meta_title.clone(),
                    meta_description: localized.meta_description.clone(),
                    meta_keywords: localized.meta_keywords.clone(),
                    attributes: serde_json::to_string(&localized.attributes)?,
                })
            })
            .collect()
    }

    /// 步骤 4: 分类关系
    ///
    /// # 规则
    /// - 分类键与排序值均按逗号拆分并 TRIM,按位置对齐
    /// - 分类键必须存在于 categoryKeys 映射
    /// - 排序值缺失或为空 → 0；非整数 → MalformedOrdinal
    fn hydrate_categories(
        &self,
        data_set: &DataSet,
        sku: &str,
    ) -> ImportResult<Vec<ProductCategory>> {
        let row = data_set.row_number();
        let category_keys = split_list(data_set.get_optional_str(keys::CATEGORY_KEY)?);
        let product_orders =
            split_list(data_set.get_optional_str(keys::CATEGORY_PRODUCT_ORDER)?);

        if category_keys.is_empty() {
            return Ok(Vec::new());
        }

        let known = data_set.get_key_map(keys::CATEGORY_KEYS)?;

        let mut categories = Vec::with_capacity(category_keys.len());
        for (index, category_key) in category_keys.iter().enumerate() {
            let fk_category = match known.get(*category_key) {
                Some(id) => *id,
                None => {
                    let mut known_keys: Vec<String> = known.keys().cloned().collect();
                    known_keys.sort();
                    return Err(ImportError::CategoryKeyNotFound {
                        row,
                        key: category_key.to_string(),
                        known_keys,
                    });
                }
            };

            let product_order = match product_orders.get(index) {
                Some(raw) if !raw.is_empty() => {
                    raw.parse::<i64>()
                        .map_err(|_| ImportError::MalformedOrdinal {
                            row,
                            index,
                            value: raw.to_string(),
                        })?
                }
                _ => 0,
            };

            categories.push(ProductCategory {
                abstract_sku: sku.to_string(),
                category_key: category_key.to_string(),
                fk_category,
                product_order,
            });
        }

        Ok(categories)
    }

    /// 步骤 5: URL（每个 locale 一条,取自本地化属性）
    fn hydrate_urls(&self, data_set: &DataSet, sku: &str) -> ImportResult<Vec<ProductUrl>> {
        Ok(data_set
            .get_localized(keys::LOCALIZED_ATTRIBUTES)?
            .iter()
            .map(|localized| ProductUrl {
                abstract_sku: sku.to_string(),
                fk_locale: localized.id_locale,
                url: localized.url.clone(),
            })
            .collect())
    }
}

impl ImportStep for ProductAbstractHydratorStep {
    fn name(&self) -> &'static str {
        "ProductAbstractHydratorStep"
    }

    fn execute(&self, data_set: &mut DataSet) -> ImportResult<()> {
        let sku = self.check_sku_product_already_exists(data_set)?;

        let product_abstract = self.hydrate_product_abstract(data_set, &sku)?;
        let localized = self.hydrate_localized_attributes(data_set, &sku)?;
        let categories = self.hydrate_categories(data_set, &sku)?;
        let urls = self.hydrate_urls(data_set, &sku)?;

        debug!(
            row = data_set.row_number(),
            sku = %sku,
            locales = localized.len(),
            categories = categories.len(),
            "抽象商品水合完成"
        );

        data_set.set(
            keys::DATA_PRODUCT_ABSTRACT_TRANSFER,
            DataValue::ProductAbstract(product_abstract),
        );
        data_set.set(
            keys::DATA_PRODUCT_ABSTRACT_LOCALIZED_TRANSFER,
            DataValue::LocalizedRecords(localized),
        );
        data_set.set(
            keys::DATA_PRODUCT_CATEGORY_TRANSFER,
            DataValue::CategoryRecords(categories),
        );
        data_set.set(keys::DATA_PRODUCT_URL_TRANSFER, DataValue::UrlRecords(urls));

        Ok(())
    }
}

/// 逗号拆分 + TRIM；NULL 或全空白 → 空列表
fn split_list(raw: Option<&str>) -> Vec<&str> {
    match raw {
        Some(value) if !value.trim().is_empty() => value.split(',').map(str::trim).collect(),
        _ => Vec::new(),
    }
}
