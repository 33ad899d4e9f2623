// ==========================================
// 商品数据导入 - DataSet 键常量
// ==========================================
// 约定: 键由进程定义,不是用户输入
// ==========================================

// ===== 输入列 =====
pub const ABSTRACT_SKU: &str = "abstract_sku";
pub const COLOR_CODE: &str = "color_code";
pub const TAX_SET_NAME: &str = "tax_set_name";
pub const CATEGORY_KEY: &str = "category_key";
pub const CATEGORY_PRODUCT_ORDER: &str = "category_product_order";
pub const NEW_FROM: &str = "new_from";
pub const NEW_TO: &str = "new_to";

// 属性列前缀: attribute_key_{N} / value_{N}，本地化列追加 .{locale}
pub const ATTRIBUTE_KEY_PREFIX: &str = "attribute_key_";
pub const ATTRIBUTE_VALUE_PREFIX: &str = "value_";

// 本地化字段列名（实际列为 {field}.{locale}）
pub const NAME: &str = "name";
pub const URL: &str = "url";
pub const DESCRIPTION: &str = "description";
pub const META_TITLE: &str = "meta_title";
pub const META_DESCRIPTION: &str = "meta_description";
pub const META_KEYWORDS: &str = "meta_keywords";

// ===== 上游步骤写入 =====
pub const LOCALES: &str = "locales";
pub const CATEGORY_KEYS: &str = "categoryKeys";
pub const ID_TAX_SET: &str = "idTaxSet";
pub const ATTRIBUTES: &str = "attributes";
pub const LOCALIZED_ATTRIBUTES: &str = "localizedAttributes";

// ===== 水合步骤派生（写入器消费）=====
pub const DATA_PRODUCT_ABSTRACT_TRANSFER: &str = "DATA_PRODUCT_ABSTRACT_TRANSFER";
pub const DATA_PRODUCT_ABSTRACT_LOCALIZED_TRANSFER: &str =
    "DATA_PRODUCT_ABSTRACT_LOCALIZED_TRANSFER";
pub const DATA_PRODUCT_CATEGORY_TRANSFER: &str = "DATA_PRODUCT_CATEGORY_TRANSFER";
pub const DATA_PRODUCT_URL_TRANSFER: &str = "DATA_PRODUCT_URL_TRANSFER";

/// 本地化列名: {field}.{locale}
pub fn localized_column(field: &str, locale_name: &str) -> String {
    format!("{}.{}", field, locale_name)
}
