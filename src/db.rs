// ==========================================
// 商品数据导入 - SQLite 连接与建表
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键、busy_timeout）
// - 幂等建表: 参考数据、商品表、运行记录、配置表
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 幂等建表并登记 schema_version
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    if read_schema_version(conn)?.unwrap_or(0) < CURRENT_SCHEMA_VERSION {
        conn.execute(
            "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?1, datetime('now'))",
            [CURRENT_SCHEMA_VERSION],
        )?;
    }
    Ok(())
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version     INTEGER PRIMARY KEY,
    applied_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id    TEXT NOT NULL,
    key         TEXT NOT NULL,
    value       TEXT NOT NULL,
    PRIMARY KEY (scope_id, key)
);

-- ===== 参考数据 =====
CREATE TABLE IF NOT EXISTS spy_locale (
    id_locale   INTEGER PRIMARY KEY,
    locale_name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS spy_category (
    id_category  INTEGER PRIMARY KEY,
    category_key TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS spy_tax_set (
    id_tax_set  INTEGER PRIMARY KEY,
    name        TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS spy_product (
    id_product  INTEGER PRIMARY KEY,
    sku         TEXT NOT NULL UNIQUE
);

-- ===== 抽象商品 =====
CREATE TABLE IF NOT EXISTS spy_product_abstract (
    id_product_abstract INTEGER PRIMARY KEY,
    sku                 TEXT NOT NULL UNIQUE,
    color_code          TEXT,
    fk_tax_set          INTEGER REFERENCES spy_tax_set (id_tax_set),
    attributes          TEXT NOT NULL,
    new_from            TEXT,
    new_to              TEXT,
    updated_at          TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS spy_product_abstract_localized_attributes (
    id_abstract_attributes INTEGER PRIMARY KEY,
    fk_product_abstract    INTEGER NOT NULL REFERENCES spy_product_abstract (id_product_abstract),
    fk_locale              INTEGER NOT NULL REFERENCES spy_locale (id_locale),
    name                   TEXT NOT NULL,
    description            TEXT,
    meta_title             TEXT,
    meta_description       TEXT,
    meta_keywords          TEXT,
    attributes             TEXT NOT NULL,
    UNIQUE (fk_product_abstract, fk_locale)
);

CREATE TABLE IF NOT EXISTS spy_product_category (
    id_product_category INTEGER PRIMARY KEY,
    fk_product_abstract INTEGER NOT NULL REFERENCES spy_product_abstract (id_product_abstract),
    fk_category         INTEGER NOT NULL REFERENCES spy_category (id_category),
    product_order       INTEGER NOT NULL DEFAULT 0,
    UNIQUE (fk_product_abstract, fk_category)
);

CREATE TABLE IF NOT EXISTS spy_url (
    id_url              INTEGER PRIMARY KEY,
    fk_product_abstract INTEGER NOT NULL REFERENCES spy_product_abstract (id_product_abstract),
    fk_locale           INTEGER NOT NULL REFERENCES spy_locale (id_locale),
    url                 TEXT NOT NULL,
    UNIQUE (fk_product_abstract, fk_locale)
);

-- ===== 运行记录 =====
CREATE TABLE IF NOT EXISTS import_run (
    batch_id          TEXT PRIMARY KEY,
    state             TEXT NOT NULL,
    policy            TEXT NOT NULL,
    started_at        TEXT NOT NULL,
    finished_at       TEXT,
    rows_read         INTEGER NOT NULL,
    rows_hydrated     INTEGER NOT NULL,
    rows_rejected     INTEGER NOT NULL,
    records_written   TEXT NOT NULL,
    records_discarded INTEGER NOT NULL,
    abort_reason      TEXT,
    elapsed_ms        INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS import_rejection (
    id           INTEGER PRIMARY KEY,
    batch_id     TEXT NOT NULL REFERENCES import_run (batch_id),
    row_number   INTEGER NOT NULL,
    abstract_sku TEXT,
    kind         TEXT NOT NULL,
    reason       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_import_rejection_batch ON import_rejection (batch_id);
"#;
