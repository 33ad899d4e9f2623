// ==========================================
// 商品数据导入 - 抽象商品领域模型
// ==========================================
// 职责: 水合步骤产出的持久化记录
// 约定: 从属记录通过 abstract_sku 关联主记录,
//       内部数值 ID 在写入阶段才解析
// ==========================================

use crate::domain::types::EntityKind;
use serde::{Deserialize, Serialize};

// ==========================================
// ProductAbstract - 抽象商品主记录
// ==========================================
// 对齐: spy_product_abstract 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductAbstract {
    pub sku: String,                // 外部唯一 SKU
    pub color_code: Option<String>, // 颜色代码
    pub fk_tax_set: Option<i64>,    // 税组 ID
    pub attributes: String,         // 自由属性（JSON 序列化后）
    pub new_from: Option<String>,   // 新品起始时间（NULL=未排期）
    pub new_to: Option<String>,     // 新品结束时间（NULL=未排期）
}

// ==========================================
// LocalizedAttributes - 上游本地化属性
// ==========================================
// 用途: 提取步骤写入 DataSet,水合步骤读取
// 生命周期: 仅在单行处理内
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalizedAttributes {
    pub id_locale: i64,
    pub locale_name: String,
    pub name: String,
    pub url: String,
    pub description: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub meta_keywords: Option<String>,
    pub attributes: serde_json::Value,
}

// ==========================================
// ProductAbstractLocalizedAttributes - 本地化从属记录
// ==========================================
// 对齐: spy_product_abstract_localized_attributes 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductAbstractLocalizedAttributes {
    pub abstract_sku: String,
    pub fk_locale: i64,
    pub name: String,
    pub description: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub meta_keywords: Option<String>,
    pub attributes: String,
}

// ==========================================
// ProductCategory - 分类关系
// ==========================================
// 对齐: spy_product_category 表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCategory {
    pub abstract_sku: String,
    pub category_key: String,
    pub fk_category: i64,
    pub product_order: i64, // 缺省为 0
}

// ==========================================
// ProductUrl - URL 从属记录
// ==========================================
// 对齐: spy_url 表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUrl {
    pub abstract_sku: String,
    pub fk_locale: i64,
    pub url: String,
}

// ==========================================
// HydratedRecord - 写入器缓冲单元
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "record", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HydratedRecord {
    ProductAbstract(ProductAbstract),
    LocalizedAttributes(ProductAbstractLocalizedAttributes),
    Category(ProductCategory),
    Url(ProductUrl),
}

impl HydratedRecord {
    pub fn kind(&self) -> EntityKind {
        match self {
            HydratedRecord::ProductAbstract(_) => EntityKind::ProductAbstract,
            HydratedRecord::LocalizedAttributes(_) => {
                EntityKind::ProductAbstractLocalizedAttributes
            }
            HydratedRecord::Category(_) => EntityKind::ProductCategory,
            HydratedRecord::Url(_) => EntityKind::Url,
        }
    }

    pub fn abstract_sku(&self) -> &str {
        match self {
            HydratedRecord::ProductAbstract(r) => &r.sku,
            HydratedRecord::LocalizedAttributes(r) => &r.abstract_sku,
            HydratedRecord::Category(r) => &r.abstract_sku,
            HydratedRecord::Url(r) => &r.abstract_sku,
        }
    }
}

impl From<ProductAbstract> for HydratedRecord {
    fn from(record: ProductAbstract) -> Self {
        HydratedRecord::ProductAbstract(record)
    }
}

impl From<ProductAbstractLocalizedAttributes> for HydratedRecord {
    fn from(record: ProductAbstractLocalizedAttributes) -> Self {
        HydratedRecord::LocalizedAttributes(record)
    }
}

impl From<ProductCategory> for HydratedRecord {
    fn from(record: ProductCategory) -> Self {
        HydratedRecord::Category(record)
    }
}

impl From<ProductUrl> for HydratedRecord {
    fn from(record: ProductUrl) -> Self {
        HydratedRecord::Url(record)
    }
}
